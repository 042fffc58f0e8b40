pub mod archive;
pub mod pool;

pub use archive::{ArchiveEntry, ExamArchive, ExamId, InMemoryArchive, JsonDirArchive};
pub use pool::{InMemoryPool, PoolFilter, QuestionPool};
