//! Scanning a content library.
//!
//! [`scan::scan`] is one incremental pass over the free files and every
//! package: files unchanged since the last pass get their cached references
//! back, everything else is read, hashed and run through
//! [`extract::extract_references`]. The whole library is then grouped and the
//! new state is written to the cache in one transaction.

pub mod error;
pub mod extract;
pub mod scan;

pub use crate::extract::{SCANNED_EXTENSIONS, extract_references};
pub use crate::scan::{Library, ScanEffort, ScanOptions, ScanReport, open_cache, scan, scan_configured};
