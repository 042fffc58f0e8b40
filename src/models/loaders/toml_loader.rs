use crate::models::loaders::ingest::RawQuestion;
use crate::models::question::Question;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 题库文件结构：`[[questions]]` 表数组
#[derive(Debug, Deserialize)]
struct PoolFile {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

/// 从 TOML 文件加载题目
///
/// 无法规范化的单条记录会被跳过并记录警告，不影响其他题目。
pub fn load_pool_file(toml_file_path: &Path) -> Result<Vec<Question>> {
    let content = fs::read_to_string(toml_file_path)
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let file: PoolFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let mut questions = Vec::with_capacity(file.questions.len());
    for raw in file.questions {
        let id = raw.id;
        match raw.normalize() {
            Ok(question) => questions.push(question),
            Err(e) => {
                tracing::warn!("跳过题目 #{} ({}): {}", id, toml_file_path.display(), e);
            }
        }
    }

    Ok(questions)
}

/// 从文件夹中加载所有 TOML 题库文件
pub fn load_pool_dir(folder_path: &str) -> Result<Vec<Question>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    for entry in fs::read_dir(&folder).with_context(|| format!("无法读取文件夹: {}", folder_path))? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    // 保证加载顺序稳定
    toml_files.sort();

    let mut questions = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_pool_file(&path) {
            Ok(loaded) => {
                tracing::info!("成功加载 {} 个题目", loaded.len());
                questions.extend(loaded);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(questions)
}
