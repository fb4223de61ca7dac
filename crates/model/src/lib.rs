//! Core data model for a content library of free files and `.var` packages.
//!
//! - [`category`] maps an extension and a logical path onto an
//!   [`AssetCategory`] bit-set, using the fixed directory [`taxonomy`].
//! - [`reference`] turns reference strings found inside asset payloads into
//!   structured [`ParsedReference`] pointers.
//! - [`entity`] and [`package`] hold the files themselves, arena-style: every
//!   file of one collection lives in a [`FileArena`] and parent/child links are
//!   plain [`FileId`]s.
//!
//! Nothing in here performs I/O.

pub mod category;
pub mod entity;
pub mod error;
pub mod package;
pub mod path;
pub mod reference;
pub mod taxonomy;

pub use crate::category::{AssetCategory, AssetKind, classify};
pub use crate::entity::{FileArena, FileEntity, FileId, Origin};
pub use crate::package::{Package, PackageName, PackageVersion};
pub use crate::reference::{ParsedReference, parse_reference};
