//! Favorite markers.
//!
//! The game flags a favorite morph with an empty `<morph name>.fav` file in a
//! `favorites` folder next to the morphs it applies to. Those files are
//! metadata only: they are indexed here, removed from the top level and
//! later looked up by the morph stage, but never adopted as children.

use crate::Staged;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::{HashMap, HashSet};
use vamlib_model::taxonomy::{FAVORITES_DIR, MORPHS_DIR};
use vamlib_model::{FileArena, FileId, path};

const FAVORITE_EXTENSION: &str = ".fav";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favorite {
    /// Directory holding the `favorites` folder; only morphs below it match.
    pub base_path: String,
    /// Where the marker lives: its on-disk path for free files.
    pub path: String,
}

/// Favorite markers keyed by lower-cased morph name.
#[derive(Debug, Clone, Default)]
pub struct FavoriteIndex {
    entries: HashMap<String, Vec<Favorite>>,
}
impl FavoriteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, morph_name: &str, favorite: Favorite) {
        self.entries.entry(morph_name.to_lowercase()).or_default().push(favorite);
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The favorite for a morph called `morph_name` living at `morph_path`.
    ///
    /// Only favorites whose base path is a component-wise prefix of the
    /// morph's path qualify. When several nested base paths qualify, the
    /// last one indexed wins.
    pub fn lookup(&self, morph_name: &str, morph_path: &str) -> Option<&Favorite> {
        self.entries
            .get(&morph_name.to_lowercase())?
            .iter()
            .rev()
            .find(|favorite| path::starts_with(morph_path, &favorite.base_path))
    }
}

/// Indexes the `.fav` files of the free collection that sit in the
/// `favorites` folder of a morph directory, and retires every `.fav` file
/// from the top level whether it was indexed or not.
#[tracing::instrument(level = "debug", skip_all, fields(files = top_level.len()))]
pub fn collect_favorites(arena: &mut FileArena, top_level: Vec<FileId>) -> Result<(FavoriteIndex, Staged)> {
    let mut index = FavoriteIndex::new();
    let mut retired = Vec::new();
    for &id in &top_level {
        let Some(file) = arena.get(id) else { continue };
        if file.extension() != FAVORITE_EXTENSION {
            continue;
        }
        retired.push(id);
        let folder = path::parent(file.path());
        if !path::file_name(folder).eq_ignore_ascii_case(FAVORITES_DIR) {
            continue;
        }
        let base_path = path::parent(folder);
        if !format!("{}/", path::key(base_path)).contains(MORPHS_DIR) {
            continue;
        }
        let marker = match file.full_path() {
            Some(full_path) => full_path.display().to_string(),
            None => file.path().to_string(),
        };
        let name = path::file_name(path::stem(file.path())).to_string();
        index.insert(
            &name,
            Favorite {
                base_path: base_path.to_string(),
                path: marker,
            },
        );
    }
    for &id in &retired {
        arena.retire(id).or_raise(|| ErrorKind::Ownership("free".to_string()))?;
    }
    tracing::debug!(favorites = index.len(), retired = retired.len(), "favorite markers collected");
    let retired: HashSet<FileId> = retired.into_iter().collect();
    let top_level = top_level.into_iter().filter(|id| !retired.contains(id)).collect();
    Ok((index, Staged { top_level, adopted: Vec::new() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcDateTime;
    use vamlib_model::FileEntity;

    fn arena(paths: &[&str]) -> FileArena {
        let mut arena = FileArena::new();
        for path in paths {
            arena.insert(FileEntity::free(format!("/vam/{path}"), *path, 0, UtcDateTime::UNIX_EPOCH)).unwrap();
        }
        arena
    }

    #[test]
    fn test_collect_indexes_and_retires() {
        let mut arena = arena(&[
            "Custom/Atom/Person/Morphs/female/favorites/Ass.fav",
            "Custom/Atom/Person/Morphs/female/Ass.vmi",
            "Saves/scene/favorites/stray.fav",
        ]);
        let top_level = arena.top_level_ids();
        let (index, staged) = collect_favorites(&mut arena, top_level).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(staged.top_level, vec![arena.find("Custom/Atom/Person/Morphs/female/Ass.vmi").unwrap()]);
        assert!(arena.top_level().all(|file| file.extension() != ".fav"));

        let favorite = index.lookup("ass", "Custom/Atom/Person/Morphs/female/Author/Ass.vmi").unwrap();
        assert_eq!(favorite.base_path, "Custom/Atom/Person/Morphs/female");
        assert_eq!(favorite.path, "/vam/Custom/Atom/Person/Morphs/female/favorites/Ass.fav");
        assert!(index.lookup("Ass", "Custom/Atom/Person/Morphs/male/Ass.vmi").is_none());
        assert!(index.lookup("Other", "Custom/Atom/Person/Morphs/female/Other.vmi").is_none());
    }

    #[test]
    fn test_nested_base_paths_last_match_wins() {
        // Both favorites qualify for the morph below; which one should take
        // precedence is undefined, so this pins down the current behaviour.
        let mut index = FavoriteIndex::new();
        let outer = Favorite {
            base_path: "Custom/Atom/Person/Morphs".to_string(),
            path: "outer.fav".to_string(),
        };
        let inner = Favorite {
            base_path: "Custom/Atom/Person/Morphs/female".to_string(),
            path: "inner.fav".to_string(),
        };
        index.insert("Smile", outer.clone());
        index.insert("Smile", inner.clone());
        assert_eq!(index.lookup("smile", "Custom/Atom/Person/Morphs/female/Smile.vmi"), Some(&inner));
        assert_eq!(index.lookup("smile", "Custom/Atom/Person/Morphs/male/Smile.vmi"), Some(&outer));
    }
}
