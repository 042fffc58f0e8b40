use crate::infrastructure::ExamId;
use crate::services::Cell;
use crate::models::question::QuestionId;
use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 题库读取错误
    #[error("题库错误: {0}")]
    Pool(#[from] PoolError),
    /// 组卷错误
    #[error("组卷错误: {0}")]
    Compose(#[from] ComposeError),
    /// 分值分配错误
    #[error("分值错误: {0}")]
    Allocation(#[from] AllocationError),
    /// 试卷分组错误
    #[error("分组错误: {0}")]
    Booklet(#[from] BookletError),
    /// 文档生成错误
    #[error("文档错误: {0}")]
    Render(#[from] RenderError),
    /// 归档错误
    #[error("归档错误: {0}")]
    Archive(#[from] ArchiveError),
    /// 打包错误
    #[error("打包错误: {0}")]
    Bundle(#[from] BundleError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 题库错误
#[derive(Debug, Error)]
pub enum PoolError {
    /// 题目记录无法规范化
    #[error("题目 {id} 记录无效: {reason}")]
    InvalidRecord { id: QuestionId, reason: String },
    /// 题库后端不可用
    #[error("题库不可用: {0}")]
    Unavailable(String),
}

/// 组卷错误
#[derive(Debug, Error)]
pub enum ComposeError {
    /// 某个 (题型, 难度) 格子的可用题目不足
    #[error("题目数量不足: {cell}, requested {requested}, available {available}")]
    Capacity {
        cell: Cell,
        requested: usize,
        available: usize,
    },
    /// 没有请求任何题目
    #[error("未选择任何题目")]
    EmptySelection,
    /// 手动选择的题目不存在
    #[error("题目 {0} 不存在")]
    UnknownQuestion(QuestionId),
    /// 手动选择的题目不属于本课程
    #[error("题目 {id} 属于课程 {found}, 不属于 {expected}")]
    CourseMismatch {
        id: QuestionId,
        expected: String,
        found: String,
    },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ComposeError {
    /// 容量不足时缺少的题目数
    pub fn shortfall(&self) -> Option<usize> {
        match self {
            ComposeError::Capacity {
                requested,
                available,
                ..
            } => Some(requested - available),
            _ => None,
        }
    }
}

/// 分值分配错误
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    /// 题目列表为空
    #[error("题目列表为空")]
    EmptySet,
    /// 目标总分必须为正
    #[error("目标总分必须大于 0, 实际为 {0}")]
    NonPositiveTarget(f64),
    /// 按比例分配时原始分值之和为 0
    #[error("原始分值之和为 0, 无法按比例分配")]
    ZeroBaseSum,
    /// 手工调分的题目不在本卷中
    #[error("题目 {0} 不在本卷中")]
    UnknownQuestion(QuestionId),
    /// 手工调分必须为非负有限数
    #[error("无效的分值: {0}")]
    InvalidScore(f64),
}

/// 试卷分组错误
#[derive(Debug, Error, PartialEq)]
pub enum BookletError {
    /// 分组标签必须是单个大写字母
    #[error("无效的分组标签: {0}")]
    InvalidGroup(String),
    /// 分组数量超出 A-Z
    #[error("分组数量必须在 1-26 之间, 实际为 {0}")]
    GroupCount(usize),
}

/// 文档生成错误
#[derive(Debug, Error)]
pub enum RenderError {
    /// 问答题空行数超出范围
    #[error("问答题空行数必须在 1-15 之间, 实际为 {0}")]
    InvalidClassicalLines(u8),
    /// Word 文档打包失败
    #[error("Word 文档生成失败: {0}")]
    Docx(String),
    /// PDF 写出失败
    #[error("PDF 生成失败: {0}")]
    Pdf(String),
    /// 不同格式的题目、顺序或分值不一致
    #[error("不同格式内容不一致: {0}")]
    Inconsistent(String),
}

/// 归档错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 试卷不存在
    #[error("试卷 {0} 不存在")]
    NotFound(ExamId),
    /// 定稿试卷不可修改
    #[error("试卷 {0} 已定稿, 不可覆盖")]
    Immutable(ExamId),
    /// 读写文件失败
    #[error("读写文件失败 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 快照序列化失败
    #[error("快照序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 打包错误
#[derive(Debug, Error)]
pub enum BundleError {
    /// 文件名重复
    #[error("打包文件名重复: {0}")]
    DuplicateName(String),
    /// ZIP 写出失败
    #[error("ZIP 写出失败: {0}")]
    Zip(String),
    /// 写文件失败
    #[error("写文件失败 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值非法
    #[error("配置项 {field} 非法: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
