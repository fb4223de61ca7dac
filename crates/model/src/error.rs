//! Model Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Classification and reference parsing
//! are total and never fail; only the entity arena can reject an operation.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A collection already contains a file at this (case-insensitive) path.
    #[display("duplicate path in collection: {_0}")]
    DuplicatePath(#[error(not(source))] String),
    /// A parent/child link would break single ownership or create a cycle.
    #[display("invalid ownership: {_0}")]
    InvalidOwnership(#[error(not(source))] String),
    /// A file id does not belong to the arena it was used with.
    #[display("unknown file id: {_0}")]
    UnknownFile(#[error(not(source))] usize),
    /// A package name token could not be parsed.
    #[display("invalid package name: {_0}")]
    InvalidPackageName(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The model is pure data; the same input always fails the same way.
        false
    }
}
