//! 组卷服务 - 业务能力层
//!
//! 从题库中选出一组有序、无重复的题目：
//! - 分层随机：按 (题型 × 难度) 3×3 矩阵逐格无放回抽样，合并后整体打乱
//! - 手动选择：按调用方给出的顺序取题，去重
//!
//! 纯函数，随机源由调用方注入。

use crate::error::ComposeError;
use crate::infrastructure::pool::{PoolFilter, QuestionPool};
use crate::models::question::{Complexity, Question, QuestionId, QuestionType};
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// 分层矩阵中的一个格子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub question_type: QuestionType,
    pub complexity: Complexity,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.question_type, self.complexity)
    }
}

/// (题型 × 难度) 题目数量矩阵
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountMatrix {
    counts: [[usize; 3]; 3],
}

impl CountMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, question_type: QuestionType, complexity: Complexity, count: usize) -> Self {
        self.set(question_type, complexity, count);
        self
    }

    pub fn set(&mut self, question_type: QuestionType, complexity: Complexity, count: usize) {
        self.counts[question_type.index()][complexity.index()] = count;
    }

    pub fn get(&self, question_type: QuestionType, complexity: Complexity) -> usize {
        self.counts[question_type.index()][complexity.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// 非零格子（按题型、难度的固定顺序）
    pub fn requested_cells(&self) -> impl Iterator<Item = (Cell, usize)> + '_ {
        QuestionType::ALL.into_iter().flat_map(move |question_type| {
            Complexity::ALL.into_iter().filter_map(move |complexity| {
                let count = self.get(question_type, complexity);
                (count > 0).then_some((
                    Cell {
                        question_type,
                        complexity,
                    },
                    count,
                ))
            })
        })
    }
}

/// 分层随机组卷
///
/// 先检查所有格子的容量，任何一格不足都直接失败，不会返回部分结果。
pub fn compose_stratified<R: Rng + ?Sized>(
    candidates: &[Question],
    matrix: &CountMatrix,
    rng: &mut R,
) -> Result<Vec<Question>, ComposeError> {
    if matrix.total() == 0 {
        return Err(ComposeError::EmptySelection);
    }

    let candidates = unique_by_id(candidates);

    let mut buckets = Vec::new();
    for (cell, requested) in matrix.requested_cells() {
        let bucket: Vec<&Question> = candidates
            .iter()
            .copied()
            .filter(|q| q.question_type == cell.question_type && q.complexity == cell.complexity)
            .collect();

        if bucket.len() < requested {
            return Err(ComposeError::Capacity {
                cell,
                requested,
                available: bucket.len(),
            });
        }
        buckets.push((cell, requested, bucket));
    }

    let mut selected = Vec::with_capacity(matrix.total());
    for (cell, requested, bucket) in buckets {
        debug!("格子 {}: 从 {} 道题中抽取 {} 道", cell, bucket.len(), requested);
        selected.extend(bucket.choose_multiple(rng, requested).map(|q| (*q).clone()));
    }
    selected.shuffle(rng);

    Ok(selected)
}

/// 手动组卷：按给定顺序取题，重复 ID 只保留第一次出现
pub fn compose_manual(
    candidates: &[Question],
    ids: &[QuestionId],
    course_code: &str,
) -> Result<Vec<Question>, ComposeError> {
    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(ids.len());

    for id in ids {
        if !seen.insert(*id) {
            debug!("题目 {} 重复选择，已忽略", id);
            continue;
        }
        let question = candidates
            .iter()
            .find(|q| q.id == *id)
            .ok_or(ComposeError::UnknownQuestion(*id))?;
        if question.course_code != course_code {
            return Err(ComposeError::CourseMismatch {
                id: *id,
                expected: course_code.to_string(),
                found: question.course_code.clone(),
            });
        }
        selected.push(question.clone());
    }

    if selected.is_empty() {
        return Err(ComposeError::EmptySelection);
    }
    Ok(selected)
}

fn unique_by_id(questions: &[Question]) -> Vec<&Question> {
    let mut seen = HashSet::new();
    questions
        .iter()
        .filter(|q| {
            let fresh = seen.insert(q.id);
            if !fresh {
                warn!("题库中题目 {} 重复出现，只保留第一条", q.id);
            }
            fresh
        })
        .collect()
}

/// 选题方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SelectionCriteria {
    /// 分层随机，可限定知识点
    Stratified {
        matrix: CountMatrix,
        #[serde(default)]
        topics: Vec<String>,
    },
    /// 手动指定题目顺序
    Manual { ids: Vec<QuestionId> },
}

/// 组卷服务
///
/// 负责向题库查询候选题，再交给纯函数完成选择。
pub struct ExamComposer<'a, P: QuestionPool + ?Sized> {
    pool: &'a P,
    course_code: String,
    owner: Option<String>,
}

impl<'a, P: QuestionPool + ?Sized> ExamComposer<'a, P> {
    /// `owner` 为 None 表示可使用全部题目（管理员）
    pub fn new(pool: &'a P, course_code: impl Into<String>, owner: Option<String>) -> Self {
        Self {
            pool,
            course_code: course_code.into(),
            owner,
        }
    }

    pub fn compose<R: Rng + ?Sized>(
        &self,
        criteria: &SelectionCriteria,
        rng: &mut R,
    ) -> Result<Vec<Question>, ComposeError> {
        let selected = match criteria {
            SelectionCriteria::Stratified { matrix, topics } => {
                let filter = PoolFilter::course(&self.course_code)
                    .with_topics(topics.clone())
                    .owned_by(self.owner.clone());
                let candidates = self.pool.find(&filter)?;
                info!(
                    "🎲 分层随机组卷: 课程 {}, 候选 {} 道, 请求 {} 道",
                    self.course_code,
                    candidates.len(),
                    matrix.total()
                );
                compose_stratified(&candidates, matrix, rng)?
            }
            SelectionCriteria::Manual { ids } => {
                let filter = PoolFilter::default().owned_by(self.owner.clone());
                let candidates = self.pool.find(&filter)?;
                info!("✅ 手动组卷: 课程 {}, 选择 {} 道", self.course_code, ids.len());
                compose_manual(&candidates, ids, &self.course_code)?
            }
        };

        info!("✓ 组卷完成: {} 道题目", selected.len());
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pool::InMemoryPool;
    use crate::models::question::Options;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question(id: u64, question_type: QuestionType, complexity: Complexity) -> Question {
        Question {
            id: QuestionId(id),
            course_code: "BIO101".to_string(),
            topic_area: if id % 2 == 0 { "Cells" } else { "Genetics" }.to_string(),
            complexity,
            question_type,
            score: 10.0,
            base_score: None,
            text: format!("Question {}", id),
            options: Options::new(),
            correct_answer: String::new(),
            created_by: "ayse".to_string(),
            flags: Vec::new(),
        }
    }

    fn bio_pool() -> Vec<Question> {
        let mut pool = Vec::new();
        for id in 1..=5 {
            pool.push(question(id, QuestionType::MultipleChoice, Complexity::Easy));
        }
        for id in 6..=8 {
            pool.push(question(id, QuestionType::TrueFalse, Complexity::Medium));
        }
        for id in 9..=10 {
            pool.push(question(id, QuestionType::Classical, Complexity::Hard));
        }
        pool
    }

    #[test]
    fn stratified_returns_exact_cell_counts() {
        let matrix = CountMatrix::new()
            .with(QuestionType::MultipleChoice, Complexity::Easy, 2)
            .with(QuestionType::TrueFalse, Complexity::Medium, 1);
        let mut rng = StdRng::seed_from_u64(7);

        let selected = compose_stratified(&bio_pool(), &matrix, &mut rng).unwrap();

        assert_eq!(selected.len(), 3);
        let mc_easy = selected
            .iter()
            .filter(|q| q.question_type == QuestionType::MultipleChoice && q.complexity == Complexity::Easy)
            .count();
        let tf_medium = selected
            .iter()
            .filter(|q| q.question_type == QuestionType::TrueFalse && q.complexity == Complexity::Medium)
            .count();
        assert_eq!((mc_easy, tf_medium), (2, 1));
        let ids: HashSet<_> = selected.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn stratified_is_deterministic_under_seed() {
        let matrix = CountMatrix::new().with(QuestionType::MultipleChoice, Complexity::Easy, 3);
        let a = compose_stratified(&bio_pool(), &matrix, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = compose_stratified(&bio_pool(), &matrix, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(
            a.iter().map(|q| q.id).collect::<Vec<_>>(),
            b.iter().map(|q| q.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn capacity_error_names_cell_and_counts() {
        let mut pool = bio_pool();
        for id in 20..24 {
            pool.push(question(id, QuestionType::MultipleChoice, Complexity::Hard));
        }
        let matrix = CountMatrix::new()
            .with(QuestionType::MultipleChoice, Complexity::Easy, 1)
            .with(QuestionType::MultipleChoice, Complexity::Hard, 6);

        let err = compose_stratified(&pool, &matrix, &mut StdRng::seed_from_u64(1)).unwrap_err();

        match &err {
            ComposeError::Capacity {
                cell,
                requested,
                available,
            } => {
                assert_eq!(cell.to_string(), "MC/hard");
                assert_eq!((*requested, *available), (6, 4));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.shortfall(), Some(2));
        assert!(err.to_string().contains("MC/hard, requested 6, available 4"));
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let err = compose_stratified(&bio_pool(), &CountMatrix::new(), &mut StdRng::seed_from_u64(1));
        assert!(matches!(err, Err(ComposeError::EmptySelection)));
    }

    #[test]
    fn duplicate_pool_entries_are_not_sampled_twice() {
        let mut pool = vec![question(1, QuestionType::TrueFalse, Complexity::Easy)];
        pool.push(pool[0].clone());
        let matrix = CountMatrix::new().with(QuestionType::TrueFalse, Complexity::Easy, 2);
        let err = compose_stratified(&pool, &matrix, &mut StdRng::seed_from_u64(3)).unwrap_err();
        assert_eq!(err.shortfall(), Some(1));
    }

    #[test]
    fn manual_keeps_order_and_dedups() {
        let ids = [QuestionId(9), QuestionId(2), QuestionId(9), QuestionId(4)];
        let selected = compose_manual(&bio_pool(), &ids, "BIO101").unwrap();
        assert_eq!(
            selected.iter().map(|q| q.id.0).collect::<Vec<_>>(),
            vec![9, 2, 4]
        );
    }

    #[test]
    fn manual_fails_on_unknown_or_foreign_question() {
        let err = compose_manual(&bio_pool(), &[QuestionId(1), QuestionId(77)], "BIO101");
        assert!(matches!(err, Err(ComposeError::UnknownQuestion(QuestionId(77)))));

        let mut pool = bio_pool();
        pool[0].course_code = "CHEM101".to_string();
        let err = compose_manual(&pool, &[QuestionId(1)], "BIO101");
        assert!(matches!(err, Err(ComposeError::CourseMismatch { .. })));
    }

    #[test]
    fn composer_applies_topic_filter() {
        let pool = InMemoryPool::new(bio_pool());
        let composer = ExamComposer::new(&pool, "BIO101", None);
        let criteria = SelectionCriteria::Stratified {
            matrix: CountMatrix::new().with(QuestionType::MultipleChoice, Complexity::Easy, 3),
            topics: vec!["Genetics".to_string()],
        };

        // MC/easy 中 Genetics 只有 1、3、5 三道
        let selected = composer.compose(&criteria, &mut StdRng::seed_from_u64(5)).unwrap();
        let mut ids: Vec<_> = selected.iter().map(|q| q.id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3, 5]);
    }
}
