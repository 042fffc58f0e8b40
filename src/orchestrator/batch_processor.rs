//! 出卷处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次出卷任务的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载题库、打开归档
//! 2. **驱动向导**：新建或恢复草稿 → 选题 → 分值分配 → 定稿
//! 3. **分组出卷**：委托 booklet_processor 逐组生成文档
//! 4. **打包输出**：所有文档打成一个 ZIP 写到输出目录
//! 5. **全局统计**：汇总分组、文档和异常题目数量
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个分组的细节
//! - **资源所有者**：唯一持有题库和归档的模块
//! - **随机源注入**：配置了种子时结果可复现

use crate::config::{Config, ExamJob};
use crate::error::AppResult;
use crate::infrastructure::{ExamArchive, InMemoryPool, JsonDirArchive};
use crate::models::exam::ExamSnapshot;
use crate::orchestrator::booklet_processor::process_booklet;
use crate::orchestrator::bundle::ArtifactBundle;
use crate::render::{renderers, RenderOptions};
use crate::services::BookletGroup;
use crate::utils::logging::{log_pool_loaded, log_startup, print_final_stats};
use crate::workflow::{ExamCtx, FinalizeOutcome, Preview, Setup};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 出卷结果
#[derive(Debug)]
pub struct BundleReport {
    pub bundle: ArtifactBundle,
    pub groups: usize,
    /// 需要核对的题目数（同一题同一标记只算一次）
    pub flagged: usize,
}

/// 为定稿快照生成所有分组的文档
///
/// 每个分组依次：生成分组 → 渲染（试卷、参考答案）×（PDF、Word）→ 加入打包
pub fn build_bundle<R: Rng + ?Sized>(
    snapshot: &ExamSnapshot,
    groups: &[BookletGroup],
    options: RenderOptions,
    generated_on: NaiveDate,
    rng: &mut R,
) -> AppResult<BundleReport> {
    if !snapshot.is_final() {
        warn!("⚠️ 试卷 {} 尚未定稿，生成的文档仅供预览", snapshot.title);
    }

    let renderers = renderers(options);
    let mut bundle = ArtifactBundle::new(&snapshot.course_code);
    let mut flagged = BTreeSet::new();

    for group in groups {
        let (documents, stats) = process_booklet(snapshot, *group, &renderers, generated_on, rng)?;
        flagged.extend(stats.flagged);
        for document in documents {
            bundle.push(document)?;
        }
    }

    Ok(BundleReport {
        bundle,
        groups: groups.len(),
        flagged: flagged.len(),
    })
}

/// 应用主结构
pub struct App {
    config: Config,
    pool: InMemoryPool,
    archive: JsonDirArchive,
    rng: StdRng,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let pool = InMemoryPool::load(Path::new(&config.pool_path))
            .with_context(|| format!("无法加载题库: {}", config.pool_path))?;
        log_pool_loaded(pool.len(), &pool.courses());

        let archive = JsonDirArchive::open(&config.archive_dir)
            .with_context(|| format!("无法打开归档目录: {}", config.archive_dir))?;

        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            config,
            pool,
            archive,
            rng,
        })
    }

    /// 运行一次出卷任务
    ///
    /// # 返回
    /// 写出的 ZIP 路径；只存草稿或等待确认时返回 None
    pub fn run(&mut self, job: &ExamJob) -> Result<Option<PathBuf>> {
        let groups = job.booklet_groups(&self.config)?;
        let mut preview = self.prepare_preview(job)?;

        if job.save_as_draft {
            preview.save_draft(&mut self.archive)?;
            info!("💾 已保存草稿，未出卷");
            return Ok(None);
        }

        let mut finish = match preview.finalize(job.confirm_discrepancy) {
            FinalizeOutcome::Finalized(finish) => finish,
            FinalizeOutcome::NeedsConfirmation {
                mut preview,
                discrepancy,
            } => {
                let id = preview.save_draft(&mut self.archive)?;
                warn!(
                    "⚠️ {}；已保存为草稿 {}，设置 confirm_discrepancy = true 后重新运行",
                    discrepancy, id
                );
                return Ok(None);
            }
        };
        let exam_id = finish.archive(&mut self.archive)?;

        let options = RenderOptions {
            classical_lines: self.config.classical_lines,
        };
        let report = build_bundle(
            finish.snapshot(),
            &groups,
            options,
            Local::now().date_naive(),
            &mut self.rng,
        )?;

        let path = report
            .bundle
            .write_zip(Path::new(&self.config.output_dir))?;
        print_final_stats(
            report.groups,
            report.bundle.len(),
            report.flagged,
            &path.display().to_string(),
        );
        info!("🗄️ 试卷编号: {}", exam_id);

        Ok(Some(path))
    }

    /// 新建：Setup → Selection → Preview；或者从草稿恢复到 Preview
    fn prepare_preview(&mut self, job: &ExamJob) -> Result<Preview> {
        if let Some(draft_id) = job.draft_id {
            let snapshot = self.archive.load(draft_id)?;
            if snapshot.is_final() {
                anyhow::bail!("试卷 {} 已定稿，不能作为草稿恢复", draft_id);
            }
            return Ok(Preview::from_draft(draft_id, &snapshot, job.policy)?);
        }

        let ctx = ExamCtx::new(
            job.title.clone(),
            job.course_code.clone(),
            job.total_score,
            job.created_by.clone(),
        )
        .with_policy(job.policy)
        .as_admin(self.config.admin);

        let setup = Setup::new(ctx)?;
        let selection = setup.select(&self.pool, &job.selection, &mut self.rng)?;
        Ok(selection.allocate()?)
    }
}
