//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责出卷任务的整体调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 出卷处理器
//! - 管理应用生命周期（加载题库、打开归档、运行任务）
//! - 驱动组卷向导直到定稿
//! - 遍历所有分组并汇总统计
//!
//! ### `booklet_processor` - 单个分组处理器
//! - 生成一个分组的题序和选项
//! - 试卷 / 参考答案 × PDF / Word 渲染
//! - 核对各格式内容一致
//!
//! ### `bundle` - 文档打包
//! - 统一命名、查重
//! - 打成 ZIP 或写到目录
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理一次出卷任务)
//!     ↓
//! workflow (Setup → Selection → Preview → Finish)
//!     ↓
//! booklet_processor (处理单个分组)
//!     ↓
//! render (PDF / Word)
//!     ↓
//! services (能力层：composer / allocator / booklet)
//!     ↓
//! infrastructure (基础设施：题库、归档)
//! ```

pub mod batch_processor;
pub mod booklet_processor;
pub mod bundle;

// 重新导出主要类型
pub use batch_processor::{build_bundle, App, BundleReport};
pub use booklet_processor::{process_booklet, BookletStats};
pub use bundle::{Artifact, ArtifactBundle};
