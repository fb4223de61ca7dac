//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. A failed write rolls the whole batch
//! back, so every error here leaves the previous cache state intact.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The directory the cache file belongs in couldn't be created.
    #[display("could not create cache directory: {}", _0.display())]
    CacheDir(#[error(not(source))] std::path::PathBuf),
    /// A reference was written for a file that has no row.
    #[display("file not found: ({_0}, {_1})")]
    FileNotFound(#[error(not(source))] String, String),
    /// A stored value doesn't fit the model (negative size, bad timestamp).
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY surfaces as a plain database error.
        matches!(self, Self::Database)
    }
}
