//! Payload readers.
//!
//! Groupers and the scan pass never open files themselves: they are handed a
//! [`ReaderHandle`] for the collection they work on, which resolves logical
//! paths to bytes. [`LocalBackend`](backend::LocalBackend) serves free files
//! from a directory on disk; archive readers for `.var` packages implement the
//! same [`PayloadReader`] trait outside of this crate.

pub mod backend;
pub mod error;
mod meta;
mod path;

pub use crate::backend::PayloadReader;
pub use crate::meta::FileMeta;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type ReaderHandle = Arc<dyn PayloadReader + Send + Sync>;
