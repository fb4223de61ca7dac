use crate::error::Result;
use crate::siblings::{self, Siblings};
use crate::{Context, Staged, json};
use vamlib_model::taxonomy::MORPH_EXTENSIONS;
use vamlib_model::{FileArena, FileId};

/// Pairs each `.vmi` with its `.vmb`.
///
/// The `.vmi` is the parent when present. Its `displayName` becomes the
/// group's morph name unless one is already known, and a valid morph picks
/// up the path of a matching favorite marker. More than two files sharing a
/// name is an anomaly: the whole group stays at the top level.
#[tracing::instrument(level = "debug", skip_all, fields(collection = ctx.collection))]
pub async fn group_morphs(arena: &mut FileArena, top_level: Vec<FileId>, ctx: &Context<'_>) -> Result<Staged> {
    let mut adopted = Vec::new();
    for siblings in siblings::find(arena, &top_level, &MORPH_EXTENSIONS) {
        let group = match siblings {
            Siblings::Group(group) => group,
            Siblings::Anomalous { stem, count } => {
                tracing::warn!(
                    collection = ctx.collection,
                    %stem,
                    count,
                    "too many morph files share one name; leaving them ungrouped"
                );
                continue;
            },
        };
        let Some(parent) = siblings::adopt(arena, &group, &MORPH_EXTENSIONS, ctx.collection, &mut adopted)? else {
            continue;
        };

        let vmi = match arena.get(parent) {
            Some(file) if file.morph_name.is_none() => group.members[0].and_then(|id| arena.get(id)),
            _ => None,
        };
        if let Some(vmi) = vmi.map(|file| file.path().to_string())
            && let Some(payload) = ctx.read(&vmi).await
            && let Some(name) = json::display_name(&payload)
            && let Some(file) = arena.get_mut(parent)
        {
            file.morph_name = Some(name);
        }

        if let Some(file) = arena.get_mut(parent)
            && file.category().is_valid_morph()
            && file.fav_file_path.is_none()
            && let Some(favorite) = ctx.favorites.lookup(file.morph_name_or_stem(), file.path())
        {
            file.fav_file_path = Some(favorite.path.clone());
        }
    }
    Ok(Staged::new(top_level, adopted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{arena_with, context};
    use crate::{Context, Favorite, FavoriteIndex};
    use std::time::Duration;
    use vamlib_storage::backend::MockBackend;

    const FEMALE: &str = "Custom/Atom/Person/Morphs/female";

    #[tokio::test]
    async fn test_pair_is_grouped_and_named() {
        let reader = MockBackend::with_files([(
            format!("{FEMALE}/Author/Smile.vmi"),
            r#"{"id": "x", "displayName": "Big Smile", /* tolerated */ }"#,
        )]);
        let mut arena = arena_with(&[format!("{FEMALE}/Author/Smile.vmb"), format!("{FEMALE}/Author/Smile.vmi")]);
        let favorites = FavoriteIndex::new();
        let top_level = arena.top_level_ids();
        let staged = group_morphs(&mut arena, top_level, &context(&reader, &favorites)).await.unwrap();

        let vmi = arena.find(format!("{FEMALE}/Author/Smile.vmi")).unwrap();
        assert_eq!(staged.top_level, vec![vmi]);
        let parent = arena.get(vmi).unwrap();
        assert_eq!(parent.children().len(), 1);
        assert_eq!(parent.morph_name.as_deref(), Some("Big Smile"));
        assert!(parent.missing_children.is_empty());
    }

    #[tokio::test]
    async fn test_lone_vmb_records_missing_vmi() {
        let reader = MockBackend::default();
        let mut arena = arena_with(&[format!("{FEMALE}/Frown.vmb")]);
        let favorites = FavoriteIndex::new();
        let top_level = arena.top_level_ids();
        let staged = group_morphs(&mut arena, top_level, &context(&reader, &favorites)).await.unwrap();

        let parent = arena.get(staged.top_level[0]).unwrap();
        assert_eq!(parent.extension(), ".vmb");
        assert_eq!(parent.missing_children, vec![format!("{FEMALE}/Frown.vmi")]);
        assert_eq!(parent.morph_name, None);
    }

    #[tokio::test]
    async fn test_unparseable_name_is_not_fatal() {
        let reader = MockBackend::with_files([(format!("{FEMALE}/Frown.vmi"), "{ broken")]);
        let mut arena = arena_with(&[format!("{FEMALE}/Frown.vmi"), format!("{FEMALE}/Frown.vmb")]);
        let favorites = FavoriteIndex::new();
        let top_level = arena.top_level_ids();
        let staged = group_morphs(&mut arena, top_level, &context(&reader, &favorites)).await.unwrap();
        assert_eq!(staged.adopted.len(), 1);
        assert_eq!(arena.get(staged.top_level[0]).unwrap().morph_name, None);
    }

    #[tokio::test]
    async fn test_timed_out_name_read_still_groups() {
        let vmi = format!("{FEMALE}/Frown.vmi");
        let reader = MockBackend::with_files([(vmi.as_str(), r#"{"displayName": "Frown"}"#)])
            .with_read_delay(Duration::from_secs(60));
        let mut arena = arena_with(&[vmi.clone(), format!("{FEMALE}/Frown.vmb")]);
        let favorites = FavoriteIndex::new();
        let ctx = Context {
            read_timeout: Duration::from_millis(20),
            ..context(&reader, &favorites)
        };
        let top_level = arena.top_level_ids();
        let staged = group_morphs(&mut arena, top_level, &ctx).await.unwrap();

        let parent = arena.find(&vmi).unwrap();
        assert_eq!(staged.top_level, vec![parent]);
        assert_eq!(staged.adopted.len(), 1);
        assert_eq!(arena.get(parent).unwrap().morph_name, None);
        assert_eq!(arena.top_level_ids(), vec![parent]);
    }

    #[tokio::test]
    async fn test_favorite_path_is_attached_to_valid_morphs() {
        let reader = MockBackend::default();
        let mut arena = arena_with(&[
            format!("{FEMALE}/Author/Ass.vmi"),
            "Custom/Atom/Person/Morphs/male/Ass.vmi".to_string(),
            "Custom/Other/Ass.vmi".to_string(),
        ]);
        let mut favorites = FavoriteIndex::new();
        favorites.insert(
            "Ass",
            Favorite {
                base_path: FEMALE.to_string(),
                path: "/vam/fav/Ass.fav".to_string(),
            },
        );
        let top_level = arena.top_level_ids();
        group_morphs(&mut arena, top_level, &context(&reader, &favorites)).await.unwrap();

        let fav_of = |path: &str| arena.get(arena.find(path).unwrap()).unwrap().fav_file_path.clone();
        assert_eq!(fav_of(&format!("{FEMALE}/Author/Ass.vmi")).as_deref(), Some("/vam/fav/Ass.fav"));
        assert_eq!(fav_of("Custom/Atom/Person/Morphs/male/Ass.vmi"), None);
        assert_eq!(fav_of("Custom/Other/Ass.vmi"), None);
    }
}
