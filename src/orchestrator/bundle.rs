//! 文档打包
//!
//! 所有分组的试卷和参考答案按 `{类型}_{分组}_{课程}.{扩展名}` 命名，
//! 可以打成一个 ZIP，也可以逐个写到目录。

use crate::error::BundleError;
use crate::render::{safe_file_segment, DocumentFormat, DocumentKind, RenderedDocument};
use crate::services::{BookletGroup, FlaggedQuestion};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// 打包中的单个文件
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub format: DocumentFormat,
    pub kind: DocumentKind,
    pub group: BookletGroup,
    pub bytes: Vec<u8>,
}

/// 一次出卷的全部文档
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    course_code: String,
    artifacts: Vec<Artifact>,
    names: BTreeSet<String>,
    flags: Vec<(BookletGroup, FlaggedQuestion)>,
}

impl ArtifactBundle {
    pub fn new(course_code: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            artifacts: Vec::new(),
            names: BTreeSet::new(),
            flags: Vec::new(),
        }
    }

    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    /// 加入一个渲染结果；文件名重复时报错
    pub fn push(&mut self, document: RenderedDocument) -> Result<(), BundleError> {
        let name = document.file_name(&self.course_code);
        if !self.names.insert(name.clone()) {
            return Err(BundleError::DuplicateName(name));
        }

        // 同一分组的 PDF / Word 标记相同，只记一份
        if document.format == DocumentFormat::Pdf {
            for flag in &document.flags {
                let entry = (document.group, *flag);
                if !self.flags.contains(&entry) {
                    self.flags.push(entry);
                }
            }
        }

        self.artifacts.push(Artifact {
            name,
            format: document.format,
            kind: document.kind,
            group: document.group,
            bytes: document.bytes,
        });
        Ok(())
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// 各分组的异常题目
    pub fn flags(&self) -> &[(BookletGroup, FlaggedQuestion)] {
        &self.flags
    }

    /// 打包文件名；课程代码中路径分隔符等字符替换为 `_`
    pub fn zip_name(&self) -> String {
        format!("exam_bundle_{}.zip", safe_file_segment(&self.course_code))
    }

    /// 打成一个 ZIP
    pub fn to_zip(&self) -> Result<Vec<u8>, BundleError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        for artifact in &self.artifacts {
            zip.start_file(artifact.name.as_str(), options)
                .map_err(|e| BundleError::Zip(e.to_string()))?;
            zip.write_all(&artifact.bytes)
                .map_err(|e| BundleError::Zip(e.to_string()))?;
        }

        let cursor = zip.finish().map_err(|e| BundleError::Zip(e.to_string()))?;
        Ok(cursor.into_inner())
    }

    /// 把 ZIP 写到目录，返回文件路径
    pub fn write_zip(&self, dir: &Path) -> Result<PathBuf, BundleError> {
        create_dir(dir)?;
        let path = dir.join(self.zip_name());
        let bytes = self.to_zip()?;
        fs::write(&path, bytes).map_err(|source| BundleError::Io {
            path: path.clone(),
            source,
        })?;
        info!("📦 已写出打包文件: {}", path.display());
        Ok(path)
    }

    /// 逐个文件写到目录
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
        create_dir(dir)?;
        let mut written = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let path = dir.join(&artifact.name);
            fs::write(&path, &artifact.bytes).map_err(|source| BundleError::Io {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        if !self.flags.is_empty() {
            warn!("⚠️ 共 {} 处题目异常，请核对", self.flags.len());
        }
        Ok(written)
    }
}

fn create_dir(dir: &Path) -> Result<(), BundleError> {
    fs::create_dir_all(dir).map_err(|source| BundleError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
