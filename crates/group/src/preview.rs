use crate::error::{ErrorKind, Result};
use crate::{Context, Staged};
use exn::ResultExt;
use std::collections::HashMap;
use vamlib_model::taxonomy::{PREVIEW_EXTENSIONS, PREVIEWABLE_EXTENSIONS};
use vamlib_model::{FileArena, FileId, path};

/// Attaches `<name>.jpg`, `<name>.jpeg` and `<name>.png` to every previewable
/// `<name>` file still at the top level. A missing preview is not recorded.
#[tracing::instrument(level = "debug", skip_all, fields(collection = ctx.collection))]
pub fn group_previews(arena: &mut FileArena, top_level: Vec<FileId>, ctx: &Context<'_>) -> Result<Staged> {
    let mut previews: HashMap<String, FileId> = HashMap::new();
    let mut owners: Vec<(FileId, String)> = Vec::new();
    for &id in &top_level {
        let Some(file) = arena.get(id) else { continue };
        let extension = file.extension();
        if PREVIEW_EXTENSIONS.iter().any(|ext| *ext == extension) {
            previews.insert(file.key(), id);
        } else if PREVIEWABLE_EXTENSIONS.iter().any(|ext| *ext == extension) {
            owners.push((id, path::key(path::stem(file.path()))));
        }
    }

    let mut adopted = Vec::new();
    for (owner, stem) in owners {
        for extension in PREVIEW_EXTENSIONS {
            let Some(preview) = previews.remove(&format!("{stem}{extension}")) else { continue };
            arena.attach(owner, preview).or_raise(|| ErrorKind::Ownership(ctx.collection.to_string()))?;
            adopted.push(preview);
        }
    }
    Ok(Staged::new(top_level, adopted))
}
