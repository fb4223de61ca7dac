//! SQLite cache of scanned library files.
//!
//! The cache remembers, per file, its size, modification time, internal id
//! and the references extracted from its payload. A scan that finds a file
//! unchanged restores its references from here instead of reading the
//! payload again. The files on disk stay the source of truth: dropping the
//! database only costs a full rescan.

mod db;
pub mod error;
mod models;
pub mod record;
mod repo;

pub use crate::db::{Database, Usage};
pub use crate::record::{FileKey, FileRecord, FileSnapshot, HashRecord, ReferenceRecord};
pub use crate::repo::Repository;
