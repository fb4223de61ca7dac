use crate::error::Result;
use crate::siblings::{self, Siblings};
use crate::{Context, Staged, json};
use vamlib_model::{FileArena, FileId};

/// Parent preference of a preset triple.
const PRESET_PREFERENCE: [&str; 3] = [".vam", ".vaj", ".vab"];

/// Groups `.vam` / `.vaj` / `.vab` files sharing one name.
///
/// The `.vam` is the parent, then the `.vaj`, then the `.vab`. The `.vam`
/// payload's `uid` becomes the internal id of the group unless one is
/// already known. Every absent member leaves a missing-child hint.
#[tracing::instrument(level = "debug", skip_all, fields(collection = ctx.collection))]
pub async fn group_presets(arena: &mut FileArena, top_level: Vec<FileId>, ctx: &Context<'_>) -> Result<Staged> {
    let mut adopted = Vec::new();
    for siblings in siblings::find(arena, &top_level, &PRESET_PREFERENCE) {
        let group = match siblings {
            Siblings::Group(group) => group,
            Siblings::Anomalous { stem, count } => {
                tracing::warn!(
                    collection = ctx.collection,
                    %stem,
                    count,
                    "too many preset files share one name; leaving them ungrouped"
                );
                continue;
            },
        };
        let Some(parent) = siblings::adopt(arena, &group, &PRESET_PREFERENCE, ctx.collection, &mut adopted)? else {
            continue;
        };

        let vam = match arena.get(parent) {
            Some(file) if file.uuid.is_none() => group.members[0].and_then(|id| arena.get(id)),
            _ => None,
        };
        if let Some(vam) = vam.map(|file| file.path().to_string())
            && let Some(payload) = ctx.read(&vam).await
            && let Some(uid) = json::uid(&payload)
            && let Some(file) = arena.get_mut(parent)
        {
            file.uuid = Some(uid);
        }
    }
    Ok(Staged::new(top_level, adopted))
}
