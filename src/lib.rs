//! # Exam Compose
//!
//! 从题库组卷、分配分值、生成多组试卷并输出 PDF / Word 文档的 Rust 库
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 题库读取、试卷归档，只暴露能力
//! - `QuestionPool` - 只读题库（`InMemoryPool` 从 TOML 加载）
//! - `ExamArchive` - 草稿 / 定稿快照（`InMemoryArchive`、`JsonDirArchive`）
//!
//! ### ② 业务能力层（Services + Render）
//! - `services/` - 纯函数，随机源由调用方注入
//! - `ExamComposer` - 分层随机 / 手动组卷
//! - `allocate` - 分值分配（按比例 / 平均 / 原始）
//! - `generate_variant` - 试卷分组（打乱题序、选项重新编号）
//! - `render/` - `PdfRenderer`、`DocxRenderer`，共用同一份内容规划
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 组卷向导 Setup → Selection → Preview → Finish
//! - `ExamCtx` - 上下文封装（课程 + 总分 + 策略 + 出题人）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 出卷处理器，管理资源并驱动向导
//! - `orchestrator/booklet_processor` - 单个分组处理器，渲染所有文档
//! - `orchestrator/bundle` - 文档打包
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod render;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ExamJob};
pub use error::{AppError, AppResult};
pub use infrastructure::{ExamArchive, ExamId, InMemoryArchive, InMemoryPool, JsonDirArchive, QuestionPool};
pub use models::exam::{ExamSnapshot, ExamStatus};
pub use models::question::{Question, QuestionId};
pub use orchestrator::{build_bundle, App, ArtifactBundle};
pub use render::{DocumentFormat, DocumentKind, DocxRenderer, PdfRenderer};
pub use services::{BookletGroup, CountMatrix, ScorePolicy, SelectionCriteria};
pub use workflow::{ExamCtx, FinalizeOutcome, Finish, Preview, Selection, Setup};
