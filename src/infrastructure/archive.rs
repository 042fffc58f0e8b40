//! 试卷归档 - 基础设施层
//!
//! 保存草稿 / 定稿快照。定稿后只允许修改归档标记；题目使用次数只在定稿时累加。

use crate::error::ArchiveError;
use crate::models::exam::{ExamSnapshot, ExamStatus};
use crate::models::question::QuestionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 归档中的试卷 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(pub u64);

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 归档列表项
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub id: ExamId,
    pub title: String,
    pub course_code: String,
    pub created_by: String,
    pub status: ExamStatus,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl ArchiveEntry {
    fn from_snapshot(id: ExamId, snapshot: &ExamSnapshot) -> Self {
        Self {
            id,
            title: snapshot.title.clone(),
            course_code: snapshot.course_code.clone(),
            created_by: snapshot.created_by.clone(),
            status: snapshot.status,
            archived: snapshot.archived,
            created_at: snapshot.created_at,
        }
    }
}

/// 试卷归档能力
pub trait ExamArchive {
    /// 保存快照。`id` 为 None 时新建；否则覆盖已有草稿
    fn save(&mut self, id: Option<ExamId>, snapshot: &ExamSnapshot) -> Result<ExamId, ArchiveError>;

    fn load(&self, id: ExamId) -> Result<ExamSnapshot, ArchiveError>;

    fn set_archived(&mut self, id: ExamId, archived: bool) -> Result<(), ArchiveError>;

    /// 按创建时间倒序列出；`owner` 为 None 时列出全部
    fn list(&self, owner: Option<&str>) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// 题目出现在定稿试卷中的次数
    fn usage_count(&self, question: QuestionId) -> Result<u32, ArchiveError>;
}

fn bump_usage(usage: &mut BTreeMap<QuestionId, u32>, snapshot: &ExamSnapshot) {
    if snapshot.status != ExamStatus::Final {
        return;
    }
    for question in &snapshot.questions {
        *usage.entry(question.id).or_insert(0) += 1;
    }
}

fn sorted_entries<'a>(
    snapshots: impl Iterator<Item = (ExamId, &'a ExamSnapshot)>,
    owner: Option<&str>,
) -> Vec<ArchiveEntry> {
    let mut entries: Vec<ArchiveEntry> = snapshots
        .filter(|(_, s)| owner.map_or(true, |o| s.created_by == o))
        .map(|(id, s)| ArchiveEntry::from_snapshot(id, s))
        .collect();
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    entries
}

/// 内存归档
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    exams: BTreeMap<ExamId, ExamSnapshot>,
    usage: BTreeMap<QuestionId, u32>,
    next_id: u64,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExamArchive for InMemoryArchive {
    fn save(&mut self, id: Option<ExamId>, snapshot: &ExamSnapshot) -> Result<ExamId, ArchiveError> {
        let id = match id {
            Some(id) => {
                let existing = self.exams.get(&id).ok_or(ArchiveError::NotFound(id))?;
                if existing.is_final() {
                    return Err(ArchiveError::Immutable(id));
                }
                id
            }
            None => {
                self.next_id += 1;
                ExamId(self.next_id)
            }
        };

        bump_usage(&mut self.usage, snapshot);
        self.exams.insert(id, snapshot.clone());
        debug!("试卷 {} 已保存 ({})", id, snapshot.status);
        Ok(id)
    }

    fn load(&self, id: ExamId) -> Result<ExamSnapshot, ArchiveError> {
        self.exams.get(&id).cloned().ok_or(ArchiveError::NotFound(id))
    }

    fn set_archived(&mut self, id: ExamId, archived: bool) -> Result<(), ArchiveError> {
        let exam = self.exams.get_mut(&id).ok_or(ArchiveError::NotFound(id))?;
        exam.archived = archived;
        Ok(())
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        Ok(sorted_entries(self.exams.iter().map(|(id, s)| (*id, s)), owner))
    }

    fn usage_count(&self, question: QuestionId) -> Result<u32, ArchiveError> {
        Ok(self.usage.get(&question).copied().unwrap_or(0))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageFile {
    #[serde(default)]
    usage: Vec<UsageRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsageRecord {
    question_id: QuestionId,
    count: u32,
}

/// JSON 目录归档：每份试卷一个 `exam_{id}.json`，使用次数保存在 `usage.json`
#[derive(Debug, Clone)]
pub struct JsonDirArchive {
    dir: PathBuf,
}

impl JsonDirArchive {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ArchiveError::Io {
            path: dir.clone(),
            source,
        })?;
        info!("🗂️ 试卷归档目录: {}", dir.display());
        Ok(Self { dir })
    }

    fn exam_path(&self, id: ExamId) -> PathBuf {
        self.dir.join(format!("exam_{}.json", id.0))
    }

    fn usage_path(&self) -> PathBuf {
        self.dir.join("usage.json")
    }

    fn read_file(path: &Path) -> Result<Vec<u8>, ArchiveError> {
        fs::read(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
        fs::write(path, bytes).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn exam_ids(&self) -> Result<Vec<ExamId>, ArchiveError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| ArchiveError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix("exam_")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<u64>().ok())
            {
                ids.push(ExamId(id));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read_usage(&self) -> Result<BTreeMap<QuestionId, u32>, ArchiveError> {
        let path = self.usage_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let file: UsageFile = serde_json::from_slice(&Self::read_file(&path)?)?;
        Ok(file
            .usage
            .into_iter()
            .map(|r| (r.question_id, r.count))
            .collect())
    }

    fn write_usage(&self, usage: &BTreeMap<QuestionId, u32>) -> Result<(), ArchiveError> {
        let file = UsageFile {
            usage: usage
                .iter()
                .map(|(id, count)| UsageRecord {
                    question_id: *id,
                    count: *count,
                })
                .collect(),
        };
        Self::write_file(&self.usage_path(), &serde_json::to_vec_pretty(&file)?)
    }
}

impl ExamArchive for JsonDirArchive {
    fn save(&mut self, id: Option<ExamId>, snapshot: &ExamSnapshot) -> Result<ExamId, ArchiveError> {
        let id = match id {
            Some(id) => {
                if self.load(id)?.is_final() {
                    return Err(ArchiveError::Immutable(id));
                }
                id
            }
            None => {
                let last = self.exam_ids()?.last().map_or(0, |id| id.0);
                ExamId(last + 1)
            }
        };

        Self::write_file(&self.exam_path(id), &serde_json::to_vec_pretty(snapshot)?)?;

        if snapshot.is_final() {
            let mut usage = self.read_usage()?;
            bump_usage(&mut usage, snapshot);
            self.write_usage(&usage)?;
        }

        debug!("试卷 {} 已写入 {}", id, self.exam_path(id).display());
        Ok(id)
    }

    fn load(&self, id: ExamId) -> Result<ExamSnapshot, ArchiveError> {
        let path = self.exam_path(id);
        if !path.exists() {
            return Err(ArchiveError::NotFound(id));
        }
        Ok(serde_json::from_slice(&Self::read_file(&path)?)?)
    }

    fn set_archived(&mut self, id: ExamId, archived: bool) -> Result<(), ArchiveError> {
        let mut snapshot = self.load(id)?;
        snapshot.archived = archived;
        Self::write_file(&self.exam_path(id), &serde_json::to_vec_pretty(&snapshot)?)
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut snapshots = Vec::new();
        for id in self.exam_ids()? {
            snapshots.push((id, self.load(id)?));
        }
        Ok(sorted_entries(snapshots.iter().map(|(id, s)| (*id, s)), owner))
    }

    fn usage_count(&self, question: QuestionId) -> Result<u32, ArchiveError> {
        Ok(self.read_usage()?.get(&question).copied().unwrap_or(0))
    }
}
