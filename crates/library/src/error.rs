//! Library Error Types
//!
//! Only failures that abort a whole scan pass surface here. Problems with
//! individual files (unreadable payloads, timeouts) are logged and counted in
//! the [`ScanReport`](crate::scan::ScanReport) instead.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading the prior snapshot or writing the new one failed. Nothing from
    /// this pass has been persisted.
    #[display("cache error")]
    Cache,
    #[display("could not list library files")]
    Storage,
    #[display("grouping failed")]
    Group,
    /// `library_root` is unset or not an absolute directory, or no cache
    /// location could be determined.
    #[display("invalid configuration")]
    Config,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache | Self::Storage)
    }
}
