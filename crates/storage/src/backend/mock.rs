//! In-memory payload reader for testing.

use super::FileMetaStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{FileMeta, PayloadReader};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use time::UtcDateTime;
use tokio::sync::RwLock;
use vamlib_model::path::starts_with;

struct Stored {
    path: String,
    modified: UtcDateTime,
    data: Vec<u8>,
}

/// In-memory payload reader for testing.
///
/// Files are stored in a `HashMap` keyed by lower-cased path behind a
/// [`RwLock`], so lookups are case-insensitive like the content library
/// itself, and [`insert`](Self::insert) can operate on `&self`.
///
/// # Examples
///
/// ```
/// use vamlib_storage::PayloadReader;
/// use vamlib_storage::backend::MockBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("Custom/Scripts/a.cslist", "a.cs\n"),
/// ]);
/// assert_eq!(backend.read("custom/scripts/A.CSLIST").await?, b"a.cs\n");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<String, Stored>>,
    read_delay: Option<Duration>,
}

impl MockBackend {
    /// Create a mock reader pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let Ok(validated) = validate_path(path.as_ref()) else {
                panic!("MockBackend::with_files: invalid path {}", path.as_ref());
            };
            map.insert(
                validated.to_lowercase(),
                Stored {
                    path: validated,
                    modified: now,
                    data: data.into(),
                },
            );
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            read_delay: None,
        }
    }

    /// Change the name of the mock reader.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every read wait for `delay` before it looks the file up.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Add or replace a file.
    pub async fn insert(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = validate_path(path)?;
        let stored = Stored {
            path: path.clone(),
            modified: UtcDateTime::now(),
            data: data.into(),
        };
        self.storage.write().await.insert(path.to_lowercase(), stored);
        Ok(())
    }

    fn file_meta(&self, stored: &Stored) -> FileMeta {
        let full_path = PathBuf::from(&self.name).join(&stored.path);
        FileMeta::new(stored.path.clone(), full_path, stored.data.len() as u64, stored.modified)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl PayloadReader for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> FileMetaStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // The read lock is never held across a yield.
            let entries: Vec<FileMeta> = {
                let guard = self.storage.read().await;
                guard
                    .values()
                    .filter(|stored| match &validated_prefix {
                        Some(pfx) => starts_with(&stored.path, pfx),
                        None => true,
                    })
                    .map(|stored| self.file_meta(stored))
                    .collect()
            };
            for meta in entries {
                yield Ok(meta);
            }
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        let guard = self.storage.read().await;
        match guard.get(&path.to_lowercase()) {
            Some(stored) => Ok(stored.data.clone()),
            None => Err(exn::Exn::from(ErrorKind::NotFound(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_read() {
        let backend = MockBackend::default();
        backend.insert("Custom/a.vam", "hello").await.unwrap();
        assert_eq!(backend.read("CUSTOM/A.vam").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read("missing.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_delay() {
        let backend = MockBackend::with_files([("a.vam", "a")]).with_read_delay(Duration::from_secs(60));
        let read = tokio::time::timeout(Duration::from_millis(20), backend.read("a.vam")).await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([
            ("Custom/Scripts/a.cs", "a"),
            ("Custom/Scripts/b.cs", "b"),
            ("Custom/ScriptsOther/c.cs", "c"),
        ]);
        let files = backend.list(Some("custom/scripts")).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.path.starts_with("Custom/Scripts/")));
        assert_eq!(backend.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read("../etc/passwd").await.is_err());
        assert!(backend.insert("../escape", "bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", "bad")]);
    }
}
