//! Local filesystem payload reader.
//!
//! This module provides a reader for free files in a directory on the local
//! filesystem, accessed using `tokio::fs` for async I/O.

use crate::backend::FileMetaStream;
use crate::error::{ErrorKind, Result};
use crate::{FileMeta, PayloadReader, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use vamlib_model::path::starts_with;

enum WalkEntry {
    File(FileMeta),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem payload reader.
///
/// Serves files from a directory on the local filesystem. All paths are
/// relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use vamlib_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("free", "/games/vam")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the free files
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not an existing
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the absolute path for a logical path.
    fn absolute_path(&self, path: &str) -> Result<PathBuf> {
        let validated = validate_path(path)?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to a logical path.
    fn relative_path(&self, absolute: &Path) -> Result<String> {
        let Ok(relative) = absolute.strip_prefix(&self.root) else {
            exn::bail!(ErrorKind::BackendError(format!(
                "path `{}` is not within root `{}`",
                absolute.display(),
                self.root.display()
            )));
        };
        let Some(relative) = relative.to_str() else {
            exn::bail!(ErrorKind::InvalidPath(relative.display().to_string()));
        };
        validate_path(relative)
    }

    fn metadata(&self, path: String, absolute: PathBuf, metadata: Metadata) -> Result<FileMeta> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(FileMeta::new(path, absolute, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: impl AsRef<Path>) -> ErrorKind {
        let path = path.as_ref().display().to_string();
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path),
            _ => ErrorKind::Io(e),
        }
    }

    /// Keeps all the `?`-able work out of the stream loop below, where errors
    /// have to be yielded instead of returned.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&str>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = self.relative_path(&path)?;
        if metadata.is_dir() {
            // Keep descending while the directory could still contain matches.
            let descend = prefix.is_none_or(|pfx| starts_with(&relative, pfx) || starts_with(pfx, &relative));
            return Ok(match descend {
                true => WalkEntry::Descend(path),
                false => WalkEntry::Skip,
            });
        }
        if let Some(pfx) = prefix
            && !starts_with(&relative, pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(self.metadata(relative, path, metadata)?));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl PayloadReader for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> FileMetaStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A directory that vanished mid-walk is simply empty.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        tracing::trace!(reader = %self.name, path, "reading payload");
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }
}
