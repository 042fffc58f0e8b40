//! 分值分配服务 - 业务能力层
//!
//! 三种策略把出题时的原始分值换算成最终分值：
//! - Proportional: `base_i * target / Σbase`
//! - Equal: `target / N`
//! - Original: 保持原始分值
//!
//! 分值保留两位小数。Proportional / Equal 以"分"为单位用最大余数法分配舍入误差，
//! 保证总分与目标相差不超过 0.01。

use crate::error::AllocationError;
use crate::models::question::{Question, QuestionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// 总分允许误差
pub const SCORE_TOLERANCE: f64 = 0.01;

/// 分值分配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePolicy {
    /// 按原始分值比例缩放到目标总分
    #[default]
    Proportional,
    /// 平均分配
    Equal,
    /// 保持原始分值
    Original,
}

impl fmt::Display for ScorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScorePolicy::Proportional => f.write_str("按比例"),
            ScorePolicy::Equal => f.write_str("平均"),
            ScorePolicy::Original => f.write_str("原始分值"),
        }
    }
}

/// 题目 ID → 最终分值
pub type ScoreAllocationMap = BTreeMap<QuestionId, f64>;

/// 总分与目标不一致（需要调用方确认）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDiscrepancy {
    pub target: f64,
    pub actual: f64,
}

impl ScoreDiscrepancy {
    pub fn difference(&self) -> f64 {
        self.actual - self.target
    }

    /// 超出误差时返回差异；Original 策略不要求总分守恒
    pub fn check(target: f64, actual: f64, policy: ScorePolicy) -> Option<Self> {
        if policy == ScorePolicy::Original {
            return None;
        }
        // 比较前先折算成分，避免浮点噪声把恰好 0.01 的差异判为超限
        let diff_cents = ((actual - target) * 100.0).round().abs();
        (diff_cents > SCORE_TOLERANCE * 100.0).then_some(Self { target, actual })
    }
}

impl fmt::Display for ScoreDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "实际总分 {:.2} 与目标 {:.2} 相差 {:+.2}",
            self.actual,
            self.target,
            self.difference()
        )
    }
}

/// 分值分配结果
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub policy: ScorePolicy,
    pub target: f64,
    /// 分值已固化的题目（保留原始分值于 `base_score`）
    pub questions: Vec<Question>,
    pub actual_total: f64,
}

impl Allocation {
    pub fn scores(&self) -> ScoreAllocationMap {
        self.questions.iter().map(|q| (q.id, q.score)).collect()
    }

    pub fn discrepancy(&self) -> Option<ScoreDiscrepancy> {
        ScoreDiscrepancy::check(self.target, self.actual_total, self.policy)
    }

    /// 手工修改单题分值（保留两位小数），原始分值不变
    ///
    /// 总分随之重算，不再向目标补齐；超出误差时由定稿环节要求确认。
    pub fn override_score(&mut self, id: QuestionId, score: f64) -> Result<(), AllocationError> {
        if !(score >= 0.0) || !score.is_finite() {
            return Err(AllocationError::InvalidScore(score));
        }
        let question = self
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(AllocationError::UnknownQuestion(id))?;
        question.score = (score * 100.0).round() / 100.0;

        let cents: i64 = self
            .questions
            .iter()
            .map(|q| (q.score * 100.0).round() as i64)
            .sum();
        self.actual_total = cents as f64 / 100.0;
        debug!("题目 {} 手工调分 → {:.2}, 总分 {:.2}", id, score, self.actual_total);
        Ok(())
    }
}

/// 分配分值
///
/// 题目为空、目标总分非正、按比例分配但原始分值和为 0 时直接报错。
pub fn allocate(
    questions: &[Question],
    target: f64,
    policy: ScorePolicy,
) -> Result<Allocation, AllocationError> {
    if questions.is_empty() {
        return Err(AllocationError::EmptySet);
    }
    if !(target > 0.0) || !target.is_finite() {
        return Err(AllocationError::NonPositiveTarget(target));
    }

    let bases: Vec<f64> = questions.iter().map(Question::base).collect();

    let cents: Vec<i64> = match policy {
        ScorePolicy::Proportional => {
            let base_sum: f64 = bases.iter().sum();
            if base_sum.abs() < f64::EPSILON {
                return Err(AllocationError::ZeroBaseSum);
            }
            let factor = target / base_sum;
            apportion_cents(&bases.iter().map(|b| b * factor).collect::<Vec<_>>(), target)
        }
        ScorePolicy::Equal => {
            let share = target / questions.len() as f64;
            apportion_cents(&vec![share; questions.len()], target)
        }
        ScorePolicy::Original => bases.iter().map(|b| (b * 100.0).round() as i64).collect(),
    };

    let scored: Vec<Question> = questions
        .iter()
        .zip(bases.iter().zip(cents.iter()))
        .map(|(question, (base, cents))| {
            let mut q = question.clone();
            q.base_score = Some(*base);
            q.score = *cents as f64 / 100.0;
            debug!("题目 {}: 原始 {} → {:.2}", q.id, base, q.score);
            q
        })
        .collect();

    let actual_total = cents.iter().sum::<i64>() as f64 / 100.0;
    let allocation = Allocation {
        policy,
        target,
        questions: scored,
        actual_total,
    };

    info!(
        "📊 分值分配 ({}): {} 道题, 总分 {:.2} (目标 {:.2})",
        policy,
        allocation.questions.len(),
        actual_total,
        target
    );
    if let Some(discrepancy) = allocation.discrepancy() {
        warn!("⚠️ {}", discrepancy);
    }

    Ok(allocation)
}

/// 最大余数法：先向下取整到分，再把剩余的分按小数部分从大到小补齐
fn apportion_cents(exact: &[f64], target: f64) -> Vec<i64> {
    let target_cents = (target * 100.0).round() as i64;
    let scaled: Vec<f64> = exact.iter().map(|v| v * 100.0).collect();
    let mut cents: Vec<i64> = scaled.iter().map(|v| v.floor() as i64).collect();

    let mut order: Vec<usize> = (0..scaled.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = scaled[a] - scaled[a].floor();
        let fb = scaled[b] - scaled[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    let mut residual = target_cents - cents.iter().sum::<i64>();
    let step = residual.signum();
    // 余数不会超过题目数；负余数从小数部分最小的开始扣
    let walk: Vec<usize> = if step >= 0 {
        order
    } else {
        order.into_iter().rev().collect()
    };
    for idx in walk.iter().cycle() {
        if residual == 0 {
            break;
        }
        cents[*idx] += step;
        residual -= step;
    }

    cents
}
