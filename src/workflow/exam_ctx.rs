//! 组卷上下文
//!
//! 封装"我在为哪门课、以什么总分和策略出这张卷子"这一信息

use crate::services::ScorePolicy;
use std::fmt::Display;

/// 组卷上下文
///
/// 在向导的各个状态之间传递
#[derive(Debug, Clone, PartialEq)]
pub struct ExamCtx {
    /// 试卷标题
    pub title: String,

    /// 课程代码
    pub course_code: String,

    /// 目标总分
    pub total_score: f64,

    /// 分值分配策略
    pub policy: ScorePolicy,

    /// 出题人
    pub created_by: String,

    /// 管理员可使用全部题目，否则只能用自己出的题
    pub admin: bool,
}

impl ExamCtx {
    pub fn new(
        title: impl Into<String>,
        course_code: impl Into<String>,
        total_score: f64,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            course_code: course_code.into(),
            total_score,
            policy: ScorePolicy::default(),
            created_by: created_by.into(),
            admin: false,
        }
    }

    pub fn with_policy(mut self, policy: ScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn as_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// 题库查询的出题人过滤条件
    pub fn owner_filter(&self) -> Option<String> {
        (!self.admin).then(|| self.created_by.clone())
    }
}

impl Display for ExamCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[课程 {} 试卷 {} 出题人 {}]",
            self.course_code, self.title, self.created_by
        )
    }
}
