//! Same-stem sibling detection shared by the morph and preset stages.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashMap;
use vamlib_model::{FileArena, FileId, path};

/// Files sharing one path-without-extension, slotted by extension.
#[derive(Debug)]
pub(crate) struct SiblingGroup {
    /// Path without extension, in the case of the first file seen.
    pub stem: String,
    /// One slot per entry of the preference list the group was built with.
    pub members: Vec<Option<FileId>>,
}
impl SiblingGroup {
    pub fn parent(&self) -> Option<FileId> {
        self.members.iter().flatten().next().copied()
    }
}

#[derive(Debug)]
pub(crate) enum Siblings {
    Group(SiblingGroup),
    /// More files than the preference list allows, or the same extension twice.
    ///
    /// An arena holds one file per case-insensitive path, so this only happens
    /// when `top_level` lists a file more than once. Such a stem is left
    /// ungrouped.
    Anomalous { stem: String, count: usize },
}

/// Buckets the top-level files whose extension is in `preference` by stem,
/// in order of first appearance.
pub(crate) fn find(arena: &FileArena, top_level: &[FileId], preference: &[&str]) -> Vec<Siblings> {
    let mut order: Vec<(String, Vec<FileId>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for &id in top_level {
        let Some(file) = arena.get(id) else { continue };
        if !preference.iter().any(|ext| *ext == file.extension()) {
            continue;
        }
        let stem = path::stem(file.path());
        let slot = *index.entry(stem.to_lowercase()).or_insert_with(|| {
            order.push((stem.to_string(), Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(id);
    }

    order
        .into_iter()
        .map(|(stem, ids)| {
            let count = ids.len();
            let mut members = vec![None; preference.len()];
            for id in ids {
                let Some(file) = arena.get(id) else { continue };
                let Some(slot) = preference.iter().position(|ext| *ext == file.extension()) else { continue };
                if members[slot].replace(id).is_some() {
                    return Siblings::Anomalous { stem, count };
                }
            }
            match count > preference.len() {
                true => Siblings::Anomalous { stem, count },
                false => Siblings::Group(SiblingGroup { stem, members }),
            }
        })
        .collect()
}

/// Attaches every present member to the group's parent and records a
/// `<stem><ext>` hint on it for every absent one.
///
/// Returns the parent; `adopted` receives the newly attached children.
pub(crate) fn adopt(
    arena: &mut FileArena,
    group: &SiblingGroup,
    preference: &[&str],
    collection: &str,
    adopted: &mut Vec<FileId>,
) -> Result<Option<FileId>> {
    let Some(parent) = group.parent() else {
        return Ok(None);
    };
    let mut missing = Vec::new();
    for (slot, member) in group.members.iter().enumerate() {
        match member {
            Some(child) if *child == parent => {},
            Some(child) => {
                arena.attach(parent, *child).or_raise(|| ErrorKind::Ownership(collection.to_string()))?;
                adopted.push(*child);
            },
            None => missing.push(format!("{}{}", group.stem, preference[slot])),
        }
    }
    if !missing.is_empty() {
        tracing::debug!(collection, stem = %group.stem, ?missing, "expected sibling files are missing");
        if let Some(file) = arena.get_mut(parent) {
            file.missing_children.extend(missing);
        }
    }
    Ok(Some(parent))
}
