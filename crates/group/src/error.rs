//! Grouping Error Types
//!
//! Content problems (arity mismatches, missing siblings, unreadable payloads)
//! are logged and absorbed by the stages themselves. What is left here are
//! broken arena invariants, which should never reach a caller in practice.

use derive_more::{Display, Error};

/// A grouping error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for grouping operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Attaching or retiring a file was rejected by its arena.
    #[display("could not update the ownership graph of collection `{_0}`")]
    Ownership(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
