//! Grouping of loose files into composite entities.
//!
//! A morph is a `.vmi` + `.vmb` pair, a clothing or hair preset up to three
//! files, a script bundle a `.cslist` plus the `.cs` files it lists, and most
//! assets come with a preview image. The stages in here attach those siblings
//! as children of one parent, so a collection's top level ends up holding one
//! entry per logical asset.
//!
//! Every stage takes the current top-level [`FileId`]s of one [`FileArena`]
//! and hands back a [`Staged`] result: the reduced top level plus the files it
//! adopted. Stages never remove entries from a list while iterating it.
//!
//! [`FileArena`]: vamlib_model::FileArena

pub mod error;
mod favorites;
pub mod json;
mod morph;
mod pipeline;
mod preset;
mod preview;
mod script;
mod siblings;

pub use crate::favorites::{Favorite, FavoriteIndex, collect_favorites};
pub use crate::morph::group_morphs;
pub use crate::pipeline::{Context, GroupOptions, Grouped, GroupedPackage, group_all, group_collection};
pub use crate::preset::group_presets;
pub use crate::preview::group_previews;
pub use crate::script::group_scripts;
use std::collections::HashSet;
use vamlib_model::FileId;

/// Outcome of one grouping stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Staged {
    /// Files still at the top level, in their original order.
    pub top_level: Vec<FileId>,
    /// Files that were given a parent by this stage.
    pub adopted: Vec<FileId>,
}
impl Staged {
    /// Removes `adopted` from `top_level`.
    pub(crate) fn new(top_level: Vec<FileId>, adopted: Vec<FileId>) -> Self {
        let owned: HashSet<FileId> = adopted.iter().copied().collect();
        let top_level = top_level.into_iter().filter(|id| !owned.contains(id)).collect();
        Self { top_level, adopted }
    }

    /// Folds a later stage into this one.
    pub(crate) fn then(mut self, next: Staged) -> Self {
        self.top_level = next.top_level;
        self.adopted.extend(next.adopted);
        self
    }
}
