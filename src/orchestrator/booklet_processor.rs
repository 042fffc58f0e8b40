//! 单个分组处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责一个分组的全部文档，是分组级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **生成分组**：在定稿题目上生成本组的题序和选项
//! 2. **逐格式渲染**：试卷 / 参考答案 × 每个渲染器
//! 3. **一致性核对**：同一类文档在不同格式中的题目、顺序、分值必须一致，
//!    并且从输出字节中读回的文字必须包含每道题的完整内容
//! 4. **统计输出**：记录文档数和异常题目数（按题目去重）

use crate::error::{AppResult, RenderError};
use crate::models::exam::ExamSnapshot;
use crate::models::question::{QuestionFlag, QuestionId};
use crate::render::{
    extract_text, verify_rendered_text, DocumentKind, DocumentMeta, DocumentRenderer,
    RenderedDocument, RenderedQuestion,
};
use crate::services::{generate_variant, BookletGroup};
use crate::utils::logging::truncate_text;
use chrono::NaiveDate;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// 分组处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BookletStats {
    pub documents: usize,
    /// 需要核对的 (题目, 标记)，各文档合并去重
    pub flagged: BTreeSet<(QuestionId, QuestionFlag)>,
}

/// 处理单个分组
///
/// # 参数
/// - `snapshot`: 定稿快照
/// - `group`: 分组标签
/// - `renderers`: 输出格式
/// - `generated_on`: 文档日期
/// - `rng`: 随机源
///
/// # 返回
/// 本组所有文档（按 类型 × 格式 顺序）以及统计
pub fn process_booklet<R: Rng + ?Sized>(
    snapshot: &ExamSnapshot,
    group: BookletGroup,
    renderers: &[Box<dyn DocumentRenderer + Send + Sync>],
    generated_on: NaiveDate,
    rng: &mut R,
) -> AppResult<(Vec<RenderedDocument>, BookletStats)> {
    log_booklet_start(group, snapshot.questions.len());

    let variant = generate_variant(&snapshot.questions, group, rng);
    for (idx, question) in variant.questions.iter().enumerate() {
        debug!(
            "[分组 {}] {}. {} ({:.2})",
            group,
            idx + 1,
            truncate_text(&question.text, 40),
            question.score
        );
    }

    let meta = DocumentMeta {
        title: snapshot.title.clone(),
        course_code: snapshot.course_code.clone(),
        group,
        generated_on,
    };

    let mut documents = Vec::with_capacity(DocumentKind::ALL.len() * renderers.len());
    let mut stats = BookletStats::default();

    for kind in DocumentKind::ALL {
        let mut outline: Option<Vec<RenderedQuestion>> = None;
        for renderer in renderers {
            let document = renderer.render(&variant, &meta, kind)?;
            let context = || format!("分组 {} {} ({})", group, kind.artifact_name(), document.format);

            // 各格式的题目编号、顺序、分值必须一致
            if let Some(expected) = &outline {
                if *expected != document.questions {
                    return Err(RenderError::Inconsistent(context()).into());
                }
            } else {
                outline = Some(document.questions.clone());
            }

            // 写出的字节里必须能读回每道题的内容
            let runs = extract_text(document.format, &document.bytes)?;
            verify_rendered_text(&document.questions, &runs)
                .map_err(|reason| RenderError::Inconsistent(format!("{}: {}", context(), reason)))?;

            stats
                .flagged
                .extend(document.flags.iter().map(|f| (f.question_id, f.flag)));
            stats.documents += 1;
            documents.push(document);
        }
    }

    if !stats.flagged.is_empty() {
        warn!("[分组 {}] ⚠️ {} 项需要核对", group, stats.flagged.len());
    }
    info!("[分组 {}] ✓ 完成: {} 个文档", group, stats.documents);

    Ok((documents, stats))
}

fn log_booklet_start(group: BookletGroup, questions: usize) {
    info!("\n{}", "─".repeat(60));
    info!("📄 开始生成分组 {} ({} 道题)", group, questions);
    info!("{}", "─".repeat(60));
}
