//! 题库 - 基础设施层
//!
//! 只读地提供题目记录，按课程 / 知识点 / 题型 / 难度 / 出题人过滤

use crate::error::PoolError;
use crate::models::loaders::{load_pool_dir, load_pool_file};
use crate::models::question::{Complexity, Question, QuestionId, QuestionType};
use std::path::Path;

/// 题库查询条件，空字段表示不限
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolFilter {
    pub course_code: Option<String>,
    pub topics: Vec<String>,
    pub question_type: Option<QuestionType>,
    pub complexity: Option<Complexity>,
    /// 只看某个出题人的题目；管理员为 None
    pub owner: Option<String>,
}

impl PoolFilter {
    pub fn course(course_code: impl Into<String>) -> Self {
        Self {
            course_code: Some(course_code.into()),
            ..Default::default()
        }
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = Some(question_type);
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn owned_by(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.course_code
            .as_deref()
            .map_or(true, |c| question.course_code == c)
            && (self.topics.is_empty() || self.topics.iter().any(|t| *t == question.topic_area))
            && self
                .question_type
                .map_or(true, |t| question.question_type == t)
            && self.complexity.map_or(true, |c| question.complexity == c)
            && self
                .owner
                .as_deref()
                .map_or(true, |o| question.created_by == o)
    }
}

/// 题库读取能力
///
/// 组卷只通过这个 trait 读取题目，从不修改题库。
pub trait QuestionPool {
    fn find(&self, filter: &PoolFilter) -> Result<Vec<Question>, PoolError>;

    fn get(&self, id: QuestionId) -> Result<Option<Question>, PoolError> {
        Ok(self
            .find(&PoolFilter::default())?
            .into_iter()
            .find(|q| q.id == id))
    }
}

/// 内存题库（测试 / 从 TOML 文件加载后使用）
#[derive(Debug, Clone, Default)]
pub struct InMemoryPool {
    questions: Vec<Question>,
}

impl InMemoryPool {
    pub fn new(mut questions: Vec<Question>) -> Self {
        questions.sort_by_key(|q| q.id);
        Self { questions }
    }

    /// 从单个 TOML 文件或一个目录加载
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let questions = if path.is_dir() {
            load_pool_dir(&path.to_string_lossy())?
        } else {
            load_pool_file(path)?
        };
        tracing::info!("📚 题库加载完成: {} 道题目", questions.len());
        Ok(Self::new(questions))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 题库中出现的课程代码（去重、排序）
    pub fn courses(&self) -> Vec<String> {
        let mut courses: Vec<String> = self.questions.iter().map(|q| q.course_code.clone()).collect();
        courses.sort();
        courses.dedup();
        courses
    }
}

impl QuestionPool for InMemoryPool {
    fn find(&self, filter: &PoolFilter) -> Result<Vec<Question>, PoolError> {
        Ok(self
            .questions
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }

    fn get(&self, id: QuestionId) -> Result<Option<Question>, PoolError> {
        Ok(self.questions.iter().find(|q| q.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Options;

    fn question(id: u64, course: &str, topic: &str, owner: &str) -> Question {
        Question {
            id: QuestionId(id),
            course_code: course.to_string(),
            topic_area: topic.to_string(),
            complexity: Complexity::Easy,
            question_type: QuestionType::TrueFalse,
            score: 5.0,
            base_score: None,
            text: format!("Q{}", id),
            options: Options::new(),
            correct_answer: "True".to_string(),
            created_by: owner.to_string(),
            flags: Vec::new(),
        }
    }

    #[test]
    fn filters_by_course_topic_and_owner() {
        let pool = InMemoryPool::new(vec![
            question(3, "BIO101", "Cells", "ayse"),
            question(1, "BIO101", "Genetics", "mehmet"),
            question(2, "CHEM101", "Cells", "ayse"),
        ]);

        let all_bio = pool.find(&PoolFilter::course("BIO101")).unwrap();
        assert_eq!(all_bio.iter().map(|q| q.id.0).collect::<Vec<_>>(), vec![1, 3]);

        let mine = pool
            .find(&PoolFilter::course("BIO101").owned_by(Some("ayse".to_string())))
            .unwrap();
        assert_eq!(mine.len(), 1);

        let cells = pool
            .find(&PoolFilter::default().with_topics(vec!["Cells".to_string()]))
            .unwrap();
        assert_eq!(cells.len(), 2);

        assert_eq!(pool.courses(), vec!["BIO101", "CHEM101"]);
        assert!(pool.get(QuestionId(2)).unwrap().is_some());
        assert!(pool.get(QuestionId(9)).unwrap().is_none());
    }
}
