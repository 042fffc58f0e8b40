//! 程序配置
//!
//! 默认值 → TOML 文件 → 环境变量（`EXAM_*`），后者覆盖前者。

use crate::error::ConfigError;
use crate::infrastructure::ExamId;
use crate::render::ClassicalLines;
use crate::services::{BookletGroup, ScorePolicy, SelectionCriteria};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 程序配置文件
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 题库文件或目录（TOML）
    pub pool_path: String,
    /// 归档目录
    pub archive_dir: String,
    /// 输出目录
    pub output_dir: String,
    /// 问答题空行数
    pub classical_lines: ClassicalLines,
    /// 默认分组数量
    pub booklet_count: usize,
    /// 固定随机种子（不设则每次不同）
    pub shuffle_seed: Option<u64>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 管理员可使用全部题目
    pub admin: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_path: "question_pool".to_string(),
            archive_dir: "exam_archive".to_string(),
            output_dir: "output".to_string(),
            classical_lines: ClassicalLines::default(),
            booklet_count: 2,
            shuffle_seed: None,
            verbose_logging: false,
            admin: false,
        }
    }
}

impl Config {
    /// 只读环境变量，无法解析的值使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// 读取 TOML 配置文件，再用环境变量覆盖
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = read_toml(path)?;
        let config = config.with_env();
        config.validate()?;
        Ok(config)
    }

    fn with_env(self) -> Self {
        Self {
            pool_path: std::env::var("EXAM_POOL_PATH").unwrap_or(self.pool_path),
            archive_dir: std::env::var("EXAM_ARCHIVE_DIR").unwrap_or(self.archive_dir),
            output_dir: std::env::var("EXAM_OUTPUT_DIR").unwrap_or(self.output_dir),
            classical_lines: std::env::var("EXAM_CLASSICAL_LINES").ok().and_then(|v| v.parse::<u8>().ok()).and_then(|v| ClassicalLines::new(v).ok()).unwrap_or(self.classical_lines),
            booklet_count: std::env::var("EXAM_BOOKLET_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(self.booklet_count),
            shuffle_seed: std::env::var("EXAM_SHUFFLE_SEED").ok().and_then(|v| v.parse().ok()).or(self.shuffle_seed),
            verbose_logging: std::env::var("EXAM_VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            admin: std::env::var("EXAM_ADMIN").ok().and_then(|v| v.parse().ok()).unwrap_or(self.admin),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=26).contains(&self.booklet_count) {
            return Err(ConfigError::Invalid {
                field: "booklet_count",
                reason: format!("必须在 1-26 之间, 实际为 {}", self.booklet_count),
            });
        }
        if self.pool_path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "pool_path",
                reason: "不能为空".to_string(),
            });
        }
        Ok(())
    }
}

/// 一次出卷任务
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExamJob {
    pub title: String,
    pub course_code: String,
    pub total_score: f64,
    #[serde(default)]
    pub policy: ScorePolicy,
    pub created_by: String,
    pub selection: SelectionCriteria,
    /// 分组数量；不设则使用配置中的默认值
    #[serde(default)]
    pub groups: Option<usize>,
    /// 从草稿恢复
    #[serde(default)]
    pub draft_id: Option<ExamId>,
    /// 总分与目标不一致时仍然定稿
    #[serde(default)]
    pub confirm_discrepancy: bool,
    /// 只保存草稿，不定稿不出卷
    #[serde(default)]
    pub save_as_draft: bool,
}

impl ExamJob {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// 本次任务的分组
    pub fn booklet_groups(&self, config: &Config) -> Result<Vec<BookletGroup>, ConfigError> {
        let count = self.groups.unwrap_or(config.booklet_count);
        BookletGroup::first(count).map_err(|e| ConfigError::Invalid {
            field: "groups",
            reason: e.to_string(),
        })
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: PathBuf::from(path),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
        path: PathBuf::from(path),
        source,
    })
}
