//! Cache-side shapes of files and references.
//!
//! Files are identified by `(path, local path)`: the on-disk path of a free
//! file with an empty local path, or a package's identity path together with
//! the file's path inside the package.

use std::path::Path;
use time::UtcDateTime;
use vamlib_model::{FileEntity, ParsedReference, parse_reference};

/// Case-insensitive identity of a cached file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    path: String,
    local_path: String,
}
impl FileKey {
    pub fn new(path: impl AsRef<str>, local_path: impl AsRef<str>) -> Self {
        Self {
            path: path.as_ref().to_lowercase(),
            local_path: local_path.as_ref().to_lowercase(),
        }
    }

    /// Key of a free file.
    pub fn free(entity: &FileEntity) -> Option<Self> {
        let full_path = entity.full_path()?.to_str()?;
        Some(Self::new(full_path, ""))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    /// Empty for free files.
    pub local_path: String,
    /// Internal id, or morph display name for morph files.
    pub uuid: Option<String>,
    pub size: u64,
    /// Stored with one-second resolution.
    pub modified: UtcDateTime,
}
impl FileRecord {
    /// Builds the row of `entity`, which lives at `path` (and `local_path`
    /// inside a package). `None` if the path isn't valid UTF-8.
    pub fn for_entity(path: &Path, local_path: &str, entity: &FileEntity) -> Option<Self> {
        Some(Self {
            path: path.to_str()?.to_string(),
            local_path: local_path.to_string(),
            uuid: entity.uuid.clone().or_else(|| entity.morph_name.clone()),
            size: entity.size(),
            modified: entity.modified(),
        })
    }

    pub fn key(&self) -> FileKey {
        FileKey::new(&self.path, &self.local_path)
    }

    /// Same size and same modification time, to the second.
    pub fn is_unchanged(&self, size: u64, modified: UtcDateTime) -> bool {
        self.size == size && self.modified.unix_timestamp() == modified.unix_timestamp()
    }
}

/// One extracted reference of a cached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub value: String,
    pub offset: usize,
    pub length: usize,
    pub morph_name: Option<String>,
    pub internal_id: Option<String>,
}
impl ReferenceRecord {
    /// Re-parses the stored value into the reference it was extracted as.
    pub fn to_parsed(&self) -> ParsedReference {
        let mut parsed = parse_reference(&self.value, self.offset, self.length);
        parsed.morph_name = self.morph_name.clone();
        parsed.internal_id = self.internal_id.clone();
        parsed
    }
}
impl From<&ParsedReference> for ReferenceRecord {
    fn from(reference: &ParsedReference) -> Self {
        Self {
            value: reference.value.clone(),
            offset: reference.offset,
            length: reference.length,
            morph_name: reference.morph_name.clone(),
            internal_id: reference.internal_id.clone(),
        }
    }
}

/// A file row together with the complete set of its references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub file: FileRecord,
    pub references: Vec<ReferenceRecord>,
}

/// Content hash of one file, used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub full_path: String,
    /// Empty for free files.
    pub local_path: String,
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        assert_eq!(FileKey::new("/VaM/a.VAR", "Custom/A.vam"), FileKey::new("/vam/a.var", "custom/a.vam"));
    }

    #[test]
    fn test_unchanged_ignores_sub_second_precision() {
        let modified = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let record = FileRecord {
            path: "/vam/a.vam".to_string(),
            local_path: String::new(),
            uuid: None,
            size: 10,
            modified,
        };
        let later = modified.replace_nanosecond(250_000_000).unwrap();
        assert!(record.is_unchanged(10, later));
        assert!(!record.is_unchanged(11, later));
        assert!(!record.is_unchanged(10, UtcDateTime::from_unix_timestamp(1_700_000_001).unwrap()));
    }

    #[test]
    fn test_reference_record_reparses() {
        let parsed = ParsedReference::parse("Author.Pack.3:/Custom/a.vmi").with_morph_name("Smile");
        let record = ReferenceRecord::from(&parsed);
        assert_eq!(record.to_parsed(), parsed);
    }
}
