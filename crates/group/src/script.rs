use crate::error::{ErrorKind, Result};
use crate::{Context, Staged};
use exn::ResultExt;
use std::collections::HashMap;
use vamlib_model::{FileArena, FileId, path};

const SCRIPT_LIST_EXTENSION: &str = ".cslist";
const SCRIPT_EXTENSION: &str = ".cs";

/// Attaches the `.cs` files named by each `.cslist` to that list.
///
/// Every non-blank line is a path relative to the list's own directory. A
/// line that doesn't resolve to a top-level `.cs` file of the collection (or
/// names one another list already took) becomes a missing-child hint. An
/// unreadable list is left as it is.
#[tracing::instrument(level = "debug", skip_all, fields(collection = ctx.collection))]
pub async fn group_scripts(arena: &mut FileArena, top_level: Vec<FileId>, ctx: &Context<'_>) -> Result<Staged> {
    let mut scripts: HashMap<String, FileId> = HashMap::new();
    let mut lists: Vec<(FileId, String)> = Vec::new();
    for &id in &top_level {
        let Some(file) = arena.get(id) else { continue };
        match file.extension() {
            SCRIPT_EXTENSION => {
                scripts.insert(file.key(), id);
            },
            SCRIPT_LIST_EXTENSION => lists.push((id, file.path().to_string())),
            _ => {},
        }
    }

    let mut adopted = Vec::new();
    for (list, list_path) in lists {
        let Some(payload) = ctx.read(&list_path).await else { continue };
        let dir = path::parent(&list_path);
        let mut missing = Vec::new();
        for line in String::from_utf8_lossy(&payload).lines() {
            let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
            if line.is_empty() {
                continue;
            }
            match scripts.remove(&path::key(path::join(dir, line))) {
                Some(script) => {
                    arena.attach(list, script).or_raise(|| ErrorKind::Ownership(ctx.collection.to_string()))?;
                    adopted.push(script);
                },
                None => missing.push(line.to_string()),
            }
        }
        if !missing.is_empty() {
            tracing::debug!(collection = ctx.collection, list = %list_path, ?missing, "listed scripts not found");
            if let Some(file) = arena.get_mut(list) {
                file.missing_children.extend(missing);
            }
        }
    }
    Ok(Staged::new(top_level, adopted))
}
