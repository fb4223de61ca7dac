//! File entities and the arena that owns them.
//!
//! Every file of one collection (the free files, or the members of one
//! package) lives in exactly one [`FileArena`]. Parent/child links are
//! [`FileId`]s into that arena: a parent owns its children, and a child's
//! `parent` is a non-owning back-reference. Once attached, a child is never
//! re-promoted to the top level.

use crate::category::{AssetCategory, classify};
use crate::error::{ErrorKind, Result};
use crate::package::PackageName;
use crate::path;
use crate::reference::ParsedReference;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use time::UtcDateTime;

/// Index of a file inside its [`FileArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);
impl FileId {
    pub fn index(&self) -> usize {
        self.0
    }
}
impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// Where a file physically lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A loose file on disk.
    Free { full_path: PathBuf },
    /// A member of exactly one `.var` package.
    Packaged { package: PackageName },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileEntity {
    origin: Origin,
    /// Normalized logical path: library-relative for free files, the local
    /// path inside the archive for packaged ones.
    path: String,
    extension: String,
    size: u64,
    modified: UtcDateTime,
    category: AssetCategory,
    pub uuid: Option<String>,
    pub morph_name: Option<String>,
    pub fav_file_path: Option<String>,
    /// Diagnostic only: expected siblings that were not found.
    pub missing_children: Vec<String>,
    /// References extracted from this file's payload. Replaced wholesale
    /// whenever the file is rescanned.
    pub references: Vec<ParsedReference>,
    children: Vec<FileId>,
    parent: Option<FileId>,
}
impl FileEntity {
    fn new(origin: Origin, logical_path: impl AsRef<str>, size: u64, modified: UtcDateTime) -> Self {
        let path = path::normalize(logical_path);
        let extension = path::extension(&path);
        let category = classify(&extension, &path);
        Self {
            origin,
            path,
            extension,
            size,
            modified,
            category,
            uuid: None,
            morph_name: None,
            fav_file_path: None,
            missing_children: Vec::new(),
            references: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn free(full_path: impl Into<PathBuf>, logical_path: impl AsRef<str>, size: u64, modified: UtcDateTime) -> Self {
        Self::new(Origin::Free { full_path: full_path.into() }, logical_path, size, modified)
    }

    pub fn packaged(package: PackageName, local_path: impl AsRef<str>, size: u64, modified: UtcDateTime) -> Self {
        Self::new(Origin::Packaged { package }, local_path, size, modified)
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_free(&self) -> bool {
        matches!(self.origin, Origin::Free { .. })
    }

    /// On-disk location of a free file; `None` for packaged files.
    pub fn full_path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Free { full_path } => Some(full_path),
            Origin::Packaged { .. } => None,
        }
    }

    pub fn package(&self) -> Option<&PackageName> {
        match &self.origin {
            Origin::Free { .. } => None,
            Origin::Packaged { package } => Some(package),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive lookup key of [`path`](Self::path).
    pub fn key(&self) -> String {
        self.path.to_lowercase()
    }

    /// Lower-cased extension including the dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> &str {
        path::file_name(&self.path)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> UtcDateTime {
        self.modified
    }

    pub fn category(&self) -> AssetCategory {
        self.category
    }

    pub fn children(&self) -> &[FileId] {
        &self.children
    }

    pub fn parent(&self) -> Option<FileId> {
        self.parent
    }

    /// Morph name, falling back to the file name without its extension.
    pub fn morph_name_or_stem(&self) -> &str {
        match &self.morph_name {
            Some(name) => name,
            None => path::file_name(path::stem(&self.path)),
        }
    }
}

/// Owner of every [`FileEntity`] in one collection.
#[derive(Debug, Clone, Default)]
pub struct FileArena {
    files: Vec<FileEntity>,
    index: HashMap<String, FileId>,
    /// Files removed from the top level without being adopted (metadata-only
    /// markers such as favorites).
    retired: HashSet<FileId>,
}
impl FileArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file; rejects a second file at the same case-insensitive path.
    pub fn insert(&mut self, file: FileEntity) -> Result<FileId> {
        let key = file.key();
        if self.index.contains_key(&key) {
            exn::bail!(ErrorKind::DuplicatePath(file.path));
        }
        let id = FileId(self.files.len());
        self.files.push(file);
        self.index.insert(key, id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, id: FileId) -> Option<&FileEntity> {
        self.files.get(id.0)
    }

    pub fn get_mut(&mut self, id: FileId) -> Option<&mut FileEntity> {
        self.files.get_mut(id.0)
    }

    /// Looks a file up by its logical path, case-insensitively.
    pub fn find(&self, path: impl AsRef<str>) -> Option<FileId> {
        self.index.get(&path::key(path)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileEntity)> {
        self.files.iter().enumerate().map(|(idx, file)| (FileId(idx), file))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FileId, &mut FileEntity)> {
        self.files.iter_mut().enumerate().map(|(idx, file)| (FileId(idx), file))
    }

    /// Files that are neither owned by a parent nor retired, in insertion order.
    pub fn top_level_ids(&self) -> Vec<FileId> {
        self.iter()
            .filter(|(id, file)| file.parent.is_none() && !self.retired.contains(id))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn top_level(&self) -> impl Iterator<Item = &FileEntity> {
        self.iter().filter(|(id, file)| file.parent.is_none() && !self.retired.contains(id)).map(|(_, file)| file)
    }

    /// Removes a file from the top level without giving it a parent.
    pub fn retire(&mut self, id: FileId) -> Result<()> {
        self.check(id)?;
        self.retired.insert(id);
        Ok(())
    }

    pub fn is_retired(&self, id: FileId) -> bool {
        self.retired.contains(&id)
    }

    fn check(&self, id: FileId) -> Result<&FileEntity> {
        match self.files.get(id.0) {
            Some(file) => Ok(file),
            None => exn::bail!(ErrorKind::UnknownFile(id.0)),
        }
    }

    /// Makes `child` an owned child of `parent`.
    ///
    /// Fails if the two are the same file, if the child already has a parent,
    /// or if the child is an ancestor of the parent.
    pub fn attach(&mut self, parent: FileId, child: FileId) -> Result<()> {
        self.check(parent)?;
        let child_file = self.check(child)?;
        if parent == child {
            exn::bail!(ErrorKind::InvalidOwnership(format!("{} cannot be its own child", child_file.path)));
        }
        if let Some(existing) = child_file.parent {
            exn::bail!(ErrorKind::InvalidOwnership(format!(
                "{} is already owned by {existing}",
                child_file.path
            )));
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                exn::bail!(ErrorKind::InvalidOwnership(format!("{} would own itself", child_file.path)));
            }
            ancestor = self.files[current.0].parent;
        }
        self.files[child.0].parent = Some(parent);
        self.files[parent.0].children.push(child);
        Ok(())
    }

    /// Every file below `id`, depth-first.
    pub fn descendants(&self, id: FileId) -> Vec<FileId> {
        let mut found = Vec::new();
        let mut stack: Vec<FileId> = match self.get(id) {
            Some(file) => file.children.iter().rev().copied().collect(),
            None => return found,
        };
        while let Some(current) = stack.pop() {
            found.push(current);
            stack.extend(self.files[current.0].children.iter().rev().copied());
        }
        found
    }

    /// Own size plus the sizes of every descendant, at any depth.
    pub fn size_with_children(&self, id: FileId) -> u64 {
        let own = self.get(id).map(|file| file.size).unwrap_or(0);
        own + self.descendants(id).into_iter().map(|child| self.files[child.0].size).sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::AssetKind;

    fn free(path: &str, size: u64) -> FileEntity {
        FileEntity::free(format!("/vam/{path}"), path, size, UtcDateTime::UNIX_EPOCH)
    }

    #[test]
    fn test_entity_category_is_derived() {
        let file = free(r"Custom\Atom\Person\Morphs\female\Smile.VMI", 1);
        assert_eq!(file.path(), "Custom/Atom/Person/Morphs/female/Smile.VMI");
        assert_eq!(file.extension(), ".vmi");
        assert_eq!(file.category(), AssetKind::FemaleNormalMorph.into());
        assert_eq!(file.morph_name_or_stem(), "Smile");
        assert!(file.is_free());
    }

    #[test]
    fn test_duplicate_paths_are_rejected() {
        let mut arena = FileArena::new();
        arena.insert(free("Custom/a.vam", 1)).unwrap();
        assert!(arena.insert(free("custom/A.VAM", 1)).is_err());
        assert_eq!(arena.find("CUSTOM/a.vam"), Some(FileId(0)));
    }

    #[test]
    fn test_attach_rules() {
        let mut arena = FileArena::new();
        let a = arena.insert(free("a.vam", 1)).unwrap();
        let b = arena.insert(free("a.vaj", 1)).unwrap();
        let c = arena.insert(free("a.jpg", 1)).unwrap();
        assert!(arena.attach(a, a).is_err());
        arena.attach(a, b).unwrap();
        // Already owned.
        assert!(arena.attach(c, b).is_err());
        arena.attach(b, c).unwrap();
        // Would create a cycle.
        assert!(arena.attach(c, a).is_err());
        assert_eq!(arena.top_level_ids(), vec![a]);
        assert_eq!(arena.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_size_with_children_is_recursive() {
        let mut arena = FileArena::new();
        let root = arena.insert(free("root.vap", 1)).unwrap();
        let mid = arena.insert(free("mid.vam", 10)).unwrap();
        let leaf = arena.insert(free("leaf.vaj", 100)).unwrap();
        let side = arena.insert(free("root.png", 1000)).unwrap();
        arena.attach(root, mid).unwrap();
        arena.attach(mid, leaf).unwrap();
        arena.attach(root, side).unwrap();
        assert_eq!(arena.size_with_children(root), 1111);
        assert_eq!(arena.size_with_children(mid), 110);
        assert_eq!(arena.descendants(root), vec![mid, leaf, side]);
    }

    #[test]
    fn test_retired_files_leave_the_top_level() {
        let mut arena = FileArena::new();
        let a = arena.insert(free("a.fav", 0)).unwrap();
        let b = arena.insert(free("b.vam", 0)).unwrap();
        arena.retire(a).unwrap();
        assert_eq!(arena.top_level_ids(), vec![b]);
        assert!(arena.is_retired(a));
        assert!(arena.retire(FileId(42)).is_err());
    }
}
