//! 组卷向导 - 流程层
//!
//! 核心职责：定义"一张卷子"从设置到定稿的完整流程
//!
//! 状态顺序：
//! 1. Setup：标题、课程、目标总分、策略
//! 2. Selection：从题库选题（分层随机 / 手动）
//! 3. Preview：分配分值，可改策略、改总分、存草稿
//! 4. Finish：定稿快照，写入归档
//!
//! 每个状态是独立的类型，只能通过转换函数进入下一个状态；
//! 任何状态都可以 `back()` 回到 Setup。草稿可以直接恢复到 Preview。

use crate::error::{AllocationError, ArchiveError, ComposeError};
use crate::infrastructure::{ExamArchive, ExamId, QuestionPool};
use crate::models::exam::{ExamSnapshot, ExamStatus};
use crate::models::question::{Question, QuestionId};
use crate::services::{
    allocate, Allocation, ExamComposer, ScorePolicy, ScoreDiscrepancy, SelectionCriteria,
};
use crate::workflow::exam_ctx::ExamCtx;
use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

/// 设置
#[derive(Debug, Clone)]
pub struct Setup {
    ctx: ExamCtx,
}

impl Setup {
    pub fn new(ctx: ExamCtx) -> Result<Self, AllocationError> {
        if !(ctx.total_score > 0.0) || !ctx.total_score.is_finite() {
            return Err(AllocationError::NonPositiveTarget(ctx.total_score));
        }
        info!("{} 📝 开始组卷", ctx);
        Ok(Self { ctx })
    }

    pub fn ctx(&self) -> &ExamCtx {
        &self.ctx
    }

    /// 选题。失败时停留在 Setup，可以调整条件后重试
    pub fn select<P, R>(
        &self,
        pool: &P,
        criteria: &SelectionCriteria,
        rng: &mut R,
    ) -> Result<Selection, ComposeError>
    where
        P: QuestionPool + ?Sized,
        R: Rng + ?Sized,
    {
        let composer = ExamComposer::new(pool, &self.ctx.course_code, self.ctx.owner_filter());
        let questions = composer.compose(criteria, rng)?;
        Ok(Selection {
            ctx: self.ctx.clone(),
            questions,
        })
    }
}

/// 已选题目，分值尚未分配
#[derive(Debug, Clone)]
pub struct Selection {
    ctx: ExamCtx,
    questions: Vec<Question>,
}

impl Selection {
    pub fn ctx(&self) -> &ExamCtx {
        &self.ctx
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// 按上下文中的策略分配分值，进入预览
    pub fn allocate(&self) -> Result<Preview, AllocationError> {
        let allocation = allocate(&self.questions, self.ctx.total_score, self.ctx.policy)?;
        Ok(Preview {
            ctx: self.ctx.clone(),
            allocation,
            draft_id: None,
        })
    }

    pub fn back(self) -> Setup {
        Setup { ctx: self.ctx }
    }
}

/// 定稿结果
#[derive(Debug)]
pub enum FinalizeOutcome {
    Finalized(Finish),
    /// 总分与目标不一致，需要带确认标记重新定稿
    NeedsConfirmation {
        preview: Preview,
        discrepancy: ScoreDiscrepancy,
    },
}

/// 预览：分值已分配
#[derive(Debug, Clone)]
pub struct Preview {
    ctx: ExamCtx,
    allocation: Allocation,
    draft_id: Option<ExamId>,
}

impl Preview {
    /// 从草稿恢复
    ///
    /// 按草稿的原始分值重新分配，不会在上一次的结果上叠加。
    pub fn from_draft(
        id: ExamId,
        snapshot: &ExamSnapshot,
        policy: ScorePolicy,
    ) -> Result<Self, AllocationError> {
        let ctx = ExamCtx::new(
            snapshot.title.clone(),
            snapshot.course_code.clone(),
            snapshot.total_score,
            snapshot.created_by.clone(),
        )
        .with_policy(policy);
        let allocation = allocate(&snapshot.questions, ctx.total_score, policy)?;
        info!("{} 📂 已恢复草稿 {}", ctx, id);
        Ok(Self {
            ctx,
            allocation,
            draft_id: Some(id),
        })
    }

    pub fn ctx(&self) -> &ExamCtx {
        &self.ctx
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub fn questions(&self) -> &[Question] {
        &self.allocation.questions
    }

    pub fn draft_id(&self) -> Option<ExamId> {
        self.draft_id
    }

    pub fn discrepancy(&self) -> Option<ScoreDiscrepancy> {
        self.allocation.discrepancy()
    }

    /// 换策略重新分配
    pub fn reallocate(&mut self, policy: ScorePolicy) -> Result<(), AllocationError> {
        self.allocation = allocate(&self.allocation.questions, self.ctx.total_score, policy)?;
        self.ctx.policy = policy;
        Ok(())
    }

    /// 手工调整单题分值；总分可能因此偏离目标
    pub fn adjust_score(&mut self, id: QuestionId, score: f64) -> Result<(), AllocationError> {
        self.allocation.override_score(id, score)?;
        if let Some(discrepancy) = self.discrepancy() {
            warn!("{} ⚠️ 手工调分后 {}", self.ctx, discrepancy);
        }
        Ok(())
    }

    /// 改目标总分并按当前策略重新分配
    pub fn set_total(&mut self, total_score: f64) -> Result<(), AllocationError> {
        self.allocation = allocate(&self.allocation.questions, total_score, self.ctx.policy)?;
        self.ctx.total_score = total_score;
        Ok(())
    }

    fn snapshot(&self, status: ExamStatus) -> ExamSnapshot {
        ExamSnapshot {
            title: self.ctx.title.clone(),
            course_code: self.ctx.course_code.clone(),
            total_score: self.ctx.total_score,
            questions: self.allocation.questions.clone(),
            created_by: self.ctx.created_by.clone(),
            status,
            archived: false,
            created_at: Utc::now(),
        }
    }

    /// 保存草稿；已保存过的草稿原地覆盖
    pub fn save_draft<A: ExamArchive + ?Sized>(
        &mut self,
        archive: &mut A,
    ) -> Result<ExamId, ArchiveError> {
        let id = archive.save(self.draft_id, &self.snapshot(ExamStatus::Draft))?;
        self.draft_id = Some(id);
        info!("{} 💾 草稿已保存: {}", self.ctx, id);
        Ok(id)
    }

    /// 定稿
    ///
    /// 总分超出误差且没有确认时返回 `NeedsConfirmation`，预览原样交回。
    pub fn finalize(self, confirm_discrepancy: bool) -> FinalizeOutcome {
        if let Some(discrepancy) = self.discrepancy() {
            if !confirm_discrepancy {
                warn!("{} ⚠️ 需要确认: {}", self.ctx, discrepancy);
                return FinalizeOutcome::NeedsConfirmation {
                    preview: self,
                    discrepancy,
                };
            }
            warn!("{} ⚠️ 已确认总分差异: {}", self.ctx, discrepancy);
        }

        let snapshot = self.snapshot(ExamStatus::Final);
        info!(
            "{} ✅ 定稿: {} 道题, 总分 {:.2}",
            self.ctx,
            snapshot.questions.len(),
            snapshot.actual_total()
        );
        FinalizeOutcome::Finalized(Finish {
            ctx: self.ctx,
            snapshot,
            draft_id: self.draft_id,
            exam_id: None,
        })
    }

    pub fn back(self) -> Setup {
        Setup { ctx: self.ctx }
    }
}

/// 定稿
#[derive(Debug, Clone)]
pub struct Finish {
    ctx: ExamCtx,
    snapshot: ExamSnapshot,
    draft_id: Option<ExamId>,
    exam_id: Option<ExamId>,
}

impl Finish {
    pub fn ctx(&self) -> &ExamCtx {
        &self.ctx
    }

    pub fn snapshot(&self) -> &ExamSnapshot {
        &self.snapshot
    }

    pub fn exam_id(&self) -> Option<ExamId> {
        self.exam_id
    }

    /// 写入归档；来自草稿时覆盖原草稿。重复调用返回同一个 ID
    pub fn archive<A: ExamArchive + ?Sized>(
        &mut self,
        archive: &mut A,
    ) -> Result<ExamId, ArchiveError> {
        if let Some(id) = self.exam_id {
            return Ok(id);
        }
        let id = archive.save(self.draft_id, &self.snapshot)?;
        self.exam_id = Some(id);
        info!("{} 🗄️ 定稿已归档: {}", self.ctx, id);
        Ok(id)
    }

    pub fn back(self) -> Setup {
        Setup { ctx: self.ctx }
    }
}
