use std::path::PathBuf;
use time::UtcDateTime;
use vamlib_model::FileEntity;

/// File metadata returned by payload readers when listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Logical path, relative to the reader's root, `/`-separated.
    pub path: String,
    /// Where the bytes physically live.
    pub full_path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: UtcDateTime,
}
impl FileMeta {
    pub fn new(path: impl Into<String>, full_path: impl Into<PathBuf>, size: u64, modified: UtcDateTime) -> Self {
        Self {
            path: path.into(),
            full_path: full_path.into(),
            size,
            modified,
        }
    }

    /// A listing entry is, by definition, a free file.
    pub fn into_free_entity(self) -> FileEntity {
        FileEntity::free(self.full_path, self.path, self.size, self.modified)
    }
}
