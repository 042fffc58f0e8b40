use crate::models::question::Question;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 试卷状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamStatus {
    Draft,
    Final,
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamStatus::Draft => f.write_str("Draft"),
            ExamStatus::Final => f.write_str("Final"),
        }
    }
}

/// 试卷快照
///
/// 题目是深拷贝，分值已固化；之后题库里的修改不会影响已保存的试卷。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSnapshot {
    pub title: String,
    pub course_code: String,
    /// 声明的目标总分（确认覆盖后可能与实际总分不一致）
    pub total_score: f64,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub status: ExamStatus,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl ExamSnapshot {
    /// 题目实际分值之和
    pub fn actual_total(&self) -> f64 {
        self.questions.iter().map(|q| q.score).sum()
    }

    pub fn is_final(&self) -> bool {
        self.status == ExamStatus::Final
    }
}
