use crate::error::Result;
use crate::{FavoriteIndex, Staged, collect_favorites, group_morphs, group_presets, group_previews, group_scripts};
use futures::{StreamExt, stream};
use std::num::NonZeroUsize;
use std::time::Duration;
use vamlib_model::{FileArena, FileId, Package};
use vamlib_storage::{PayloadReader, ReaderHandle};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);
const FREE_COLLECTION: &str = "free";

/// Tuning for [`group_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOptions {
    /// Maximum number of packages grouped at the same time.
    pub parallelism: NonZeroUsize,
    /// Upper bound for opening and reading one payload.
    pub read_timeout: Duration,
}
impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// What the stages of one collection work with.
pub struct Context<'a> {
    /// Name of the collection, for logging.
    pub collection: &'a str,
    pub reader: &'a dyn PayloadReader,
    pub favorites: &'a FavoriteIndex,
    pub read_timeout: Duration,
}
impl Context<'_> {
    /// Reads a payload, or logs why it couldn't.
    ///
    /// Failing reads never fail a stage: the caller carries on as if the
    /// payload held nothing useful.
    pub(crate) async fn read(&self, path: &str) -> Option<Vec<u8>> {
        match tokio::time::timeout(self.read_timeout, self.reader.read(path)).await {
            Ok(Ok(payload)) => Some(payload),
            Ok(Err(e)) => {
                tracing::warn!(
                    collection = self.collection,
                    reader = self.reader.name(),
                    path,
                    error = ?e,
                    "could not read payload"
                );
                None
            },
            Err(_) => {
                let timeout = self.read_timeout;
                tracing::warn!(collection = self.collection, path, ?timeout, "payload read timed out");
                None
            },
        }
    }
}

/// Runs Script, Morph, Preset and Preview grouping over one collection, in
/// that order. Each stage only sees what the previous one left at the top.
#[tracing::instrument(level = "debug", skip_all, fields(collection = ctx.collection, files = top_level.len()))]
pub async fn group_collection(arena: &mut FileArena, top_level: Vec<FileId>, ctx: &Context<'_>) -> Result<Staged> {
    let scripts = group_scripts(arena, top_level, ctx).await?;
    let morphs = group_morphs(arena, scripts.top_level.clone(), ctx).await?;
    let presets = group_presets(arena, morphs.top_level.clone(), ctx).await?;
    let previews = group_previews(arena, presets.top_level.clone(), ctx)?;
    let staged = scripts.then(morphs).then(presets).then(previews);
    tracing::debug!(
        collection = ctx.collection,
        top_level = staged.top_level.len(),
        adopted = staged.adopted.len(),
        "collection grouped"
    );
    Ok(staged)
}

/// A package after grouping, handed back together with its reader.
pub struct GroupedPackage {
    pub package: Package,
    pub reader: ReaderHandle,
    pub staged: Staged,
}

/// Result of [`group_all`].
pub struct Grouped {
    /// The free collection's grouping; `.fav` markers are neither at its top
    /// level nor adopted.
    pub free: Staged,
    /// Packages in the order they were passed in.
    pub packages: Vec<GroupedPackage>,
    pub favorites: FavoriteIndex,
}

/// Groups the free collection and every package.
///
/// Favorite markers are collected from the free files first, since morphs of
/// any collection may refer to them. After that the free files and the
/// packages are independent: up to `options.parallelism` packages are grouped
/// at the same time, each one owned by exactly one worker.
#[tracing::instrument(skip_all, fields(free = free.len(), packages = packages.len()))]
pub async fn group_all(
    free: &mut FileArena,
    free_reader: &dyn PayloadReader,
    packages: Vec<(Package, ReaderHandle)>,
    options: &GroupOptions,
) -> Result<Grouped> {
    let top_level = free.top_level_ids();
    let (favorites, remaining) = collect_favorites(free, top_level)?;
    let read_timeout = options.read_timeout;
    let favorites_ref = &favorites;

    let free_ctx = Context {
        collection: FREE_COLLECTION,
        reader: free_reader,
        favorites: favorites_ref,
        read_timeout,
    };
    let free_future = group_collection(free, remaining.top_level, &free_ctx);

    let packages_future = stream::iter(packages.into_iter().enumerate())
        .map(|(position, (mut package, reader))| async move {
            let collection = package.name.to_string();
            let ctx = Context {
                collection: &collection,
                reader: reader.as_ref(),
                favorites: favorites_ref,
                read_timeout,
            };
            let top_level = package.files().top_level_ids();
            let staged = group_collection(package.files_mut(), top_level, &ctx).await;
            (position, staged.map(|staged| GroupedPackage { package, reader, staged }))
        })
        .buffer_unordered(options.parallelism.get())
        .collect::<Vec<_>>();

    let (free_staged, mut grouped) = futures::join!(free_future, packages_future);
    grouped.sort_by_key(|(position, _)| *position);
    let packages = grouped.into_iter().map(|(_, result)| result).collect::<Result<Vec<_>>>()?;
    tracing::info!(packages = packages.len(), favorites = favorites.len(), "library grouped");
    Ok(Grouped {
        free: free_staged?,
        packages,
        favorites,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use time::UtcDateTime;
    use vamlib_model::FileEntity;
    use vamlib_storage::backend::MockBackend;

    pub(crate) fn arena_with(paths: &[impl AsRef<str>]) -> FileArena {
        let mut arena = FileArena::new();
        for path in paths {
            let path = path.as_ref();
            arena.insert(FileEntity::free(format!("/vam/{path}"), path, 1, UtcDateTime::UNIX_EPOCH)).unwrap();
        }
        arena
    }

    pub(crate) fn context<'a>(reader: &'a dyn PayloadReader, favorites: &'a FavoriteIndex) -> Context<'a> {
        Context {
            collection: "test",
            reader,
            favorites,
            read_timeout: Duration::from_secs(1),
        }
    }

    fn names(arena: &FileArena, ids: &[FileId]) -> Vec<String> {
        ids.iter().map(|id| arena.get(*id).unwrap().file_name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let reader = MockBackend::with_files([("Custom/a.vam", r#"{"uid": "a"}"#)]);
        let mut arena = arena_with(&[
            "Custom/a.vab",
            "Custom/a.vaj",
            "Custom/a.vam",
            "Custom/a.jpg",
            "Custom/a_preset1.vap",
            "Custom/a_preset1.png",
            "Custom/a_preset2.vap",
            "Custom/a_preset2.jpeg",
        ]);
        let favorites = FavoriteIndex::new();
        let top_level = arena.top_level_ids();
        let staged = group_collection(&mut arena, top_level, &context(&reader, &favorites)).await.unwrap();

        assert_eq!(names(&arena, &staged.top_level), vec!["a.vam", "a_preset1.vap", "a_preset2.vap"]);
        assert_eq!(staged.adopted.len(), 5);
        let vam = arena.find("Custom/a.vam").unwrap();
        assert_eq!(names(&arena, arena.get(vam).unwrap().children()), vec!["a.vaj", "a.vab", "a.jpg"]);
        let preset1 = arena.find("Custom/a_preset1.vap").unwrap();
        assert_eq!(names(&arena, arena.get(preset1).unwrap().children()), vec!["a_preset1.png"]);
        let preset2 = arena.find("Custom/a_preset2.vap").unwrap();
        assert_eq!(names(&arena, arena.get(preset2).unwrap().children()), vec!["a_preset2.jpeg"]);
        assert_eq!(arena.top_level_ids(), staged.top_level);
    }

    #[tokio::test]
    async fn test_size_with_children_after_grouping() {
        let reader = MockBackend::with_files([("Custom/Scripts/s.cslist", "a.cs\n")]);
        let mut arena = FileArena::new();
        for (path, size) in [
            ("Custom/Scripts/s.cslist", 1),
            ("Custom/Scripts/a.cs", 10),
            ("Custom/Scripts/s.vaj", 100),
            ("Custom/Scripts/s.jpg", 1000),
        ] {
            arena.insert(FileEntity::free(path, path, size, UtcDateTime::UNIX_EPOCH)).unwrap();
        }
        let favorites = FavoriteIndex::new();
        let top_level = arena.top_level_ids();
        let staged = group_collection(&mut arena, top_level, &context(&reader, &favorites)).await.unwrap();
        let total: u64 = staged.top_level.iter().map(|id| arena.size_with_children(*id)).sum();
        assert_eq!(total, 1111);
    }

    #[tokio::test]
    async fn test_group_all_handles_favorites_and_packages() {
        let free_reader = MockBackend::default();
        let mut free = arena_with(&[
            "Custom/Atom/Person/Morphs/female/favorites/Ass.fav",
            "Custom/Atom/Person/Morphs/female/Ass.vmi",
            "Custom/Atom/Person/Morphs/female/Ass.vmb",
            "Saves/other/favorites/Ass.fav",
        ]);

        let mut packages = Vec::new();
        for (name, vmi) in [
            ("Author.Morphs.1", "Custom/Atom/Person/Morphs/female/Author/Ass.vmi"),
            ("Author.Elsewhere.2", "Custom/Other/Ass.vmi"),
        ] {
            let mut package = Package::new(name.parse().unwrap(), format!("/vam/AddonPackages/{name}.var"));
            package.add_file(vmi, 1, UtcDateTime::UNIX_EPOCH).unwrap();
            let reader: ReaderHandle = Arc::new(MockBackend::with_files([(vmi, r#"{"displayName": "Ass"}"#)]));
            packages.push((package, reader));
        }

        let options = GroupOptions {
            parallelism: NonZeroUsize::new(2).unwrap(),
            read_timeout: Duration::from_secs(1),
        };
        let grouped = group_all(&mut free, &free_reader, packages, &options).await.unwrap();

        assert_eq!(names(&free, &grouped.free.top_level), vec!["Ass.vmi"]);
        assert!(free.top_level().all(|file| file.extension() != ".fav"));
        let free_morph = free.get(grouped.free.top_level[0]).unwrap();
        assert_eq!(
            free_morph.fav_file_path.as_deref(),
            Some("/vam/Custom/Atom/Person/Morphs/female/favorites/Ass.fav")
        );
        assert!(free_morph.children().iter().all(|child| free.get(*child).unwrap().extension() != ".fav"));

        let package_names: Vec<String> = grouped.packages.iter().map(|p| p.package.name.to_string()).collect();
        assert_eq!(package_names, vec!["Author.Morphs.1", "Author.Elsewhere.2"]);
        let fav_of = |index: usize| {
            let files = grouped.packages[index].package.files();
            files.top_level().next().unwrap().fav_file_path.clone()
        };
        assert!(fav_of(0).is_some());
        assert_eq!(fav_of(1), None);
        assert_eq!(grouped.packages[0].package.files().top_level().next().unwrap().morph_name.as_deref(), Some("Ass"));
    }
}
