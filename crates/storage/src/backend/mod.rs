//! Payload reader trait and implementations.
//!
//! This module defines the `PayloadReader` trait, the single collaborator the
//! grouping and scanning code uses to get at file contents, whether those
//! live loose on disk or inside a `.var` archive.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::meta::FileMeta;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type FileMetaStream<'a> = Pin<Box<dyn Stream<Item = Result<FileMeta>> + Send + 'a>>;

/// Unified interface for reading library payloads.
///
/// # Path Handling
/// All paths are logical, `/`-separated and relative to the reader's root.
/// Implementations must validate them with
/// [`validate_path`](crate::validate_path) before use, and look them up
/// case-insensitively where the underlying store allows it.
///
/// # Examples
///
/// ```
/// use vamlib_storage::{PayloadReader, error::Result};
///
/// async fn script_lines(reader: &dyn PayloadReader) -> Result<usize> {
///     let data = reader.read("Custom/Scripts/bundle.cslist").await?;
///     Ok(String::from_utf8_lossy(&data).lines().count())
/// }
/// ```
#[async_trait]
pub trait PayloadReader: Send + Sync {
    /// Name of the reader, used for logging only.
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<FileMeta>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata matching an optional prefix.
    ///
    /// If a prefix is provided, only files whose paths start with the prefix
    /// (component-wise) are returned.
    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> FileMetaStream<'a>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
}
