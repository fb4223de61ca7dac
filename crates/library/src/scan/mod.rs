//! Incremental scan pass.
//!
//! 1. The previous pass's file and reference rows are loaded as a snapshot.
//! 2. Every file of every collection is compared against it: unchanged files
//!    get their references (and internal id or morph name) back, the others
//!    are read, hashed and searched for references.
//! 3. The whole library is grouped.
//! 4. Rows of files that were read, or whose id or morph name changed during
//!    grouping, are written back in one transaction.

mod file;

pub use self::file::{ScanCounts, ScanEffort};
use self::file::{Container, Snapshot, scan_collection};
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use vamlib_cache::{Database, FileKey, FileSnapshot, ReferenceRecord, Repository};
use vamlib_config::Config;
use vamlib_group::{GroupOptions, Grouped, group_all};
use vamlib_model::{FileArena, Package};
use vamlib_storage::backend::LocalBackend;
use vamlib_storage::{PayloadReader, ReaderHandle};

const FREE_READER: &str = "free";

/// Tuning for [`scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOptions {
    pub group: GroupOptions,
    /// Compute everything, persist nothing.
    pub dry_run: bool,
}
impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            group: GroupOptions {
                parallelism: config.parallelism(),
                read_timeout: config.read_timeout(),
            },
            dry_run: config.dry_run,
        }
    }
}

/// Everything one pass looks at.
pub struct Library {
    pub free: FileArena,
    pub free_reader: ReaderHandle,
    pub packages: Vec<(Package, ReaderHandle)>,
}
impl Library {
    /// A library of the free files `reader` lists (under `prefix`, if given)
    /// and no packages yet.
    #[tracing::instrument(level = "debug", skip_all, fields(reader = reader.name()))]
    pub async fn discover(reader: ReaderHandle, prefix: Option<&str>) -> Result<Self> {
        let free = discover_free_files(reader.as_ref(), prefix).await?;
        Ok(Self {
            free,
            free_reader: reader,
            packages: Vec::new(),
        })
    }

    /// The free files under the configured `library_root`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn open(config: &Config) -> Result<Self> {
        let root = config.library_root.as_deref().ok_or_raise(|| ErrorKind::Config)?;
        let backend = LocalBackend::new(FREE_READER, root).or_raise(|| ErrorKind::Config)?;
        tracing::debug!(root = %root.display(), "opening library");
        Self::discover(Arc::new(backend), None).await
    }

    pub fn with_package(mut self, package: Package, reader: ReaderHandle) -> Self {
        self.packages.push((package, reader));
        self
    }
}

async fn discover_free_files(reader: &dyn PayloadReader, prefix: Option<&str>) -> Result<FileArena> {
    let mut arena = FileArena::new();
    let mut listing = reader.list_stream(prefix);
    while let Some(meta) = listing.next().await {
        let meta = meta.or_raise(|| ErrorKind::Storage)?;
        let path = meta.path.clone();
        if let Err(e) = arena.insert(meta.into_free_entity()) {
            tracing::warn!(reader = reader.name(), path = %path, error = ?e, "skipping file");
        }
    }
    tracing::debug!(reader = reader.name(), files = arena.len(), "discovered free files");
    Ok(arena)
}

/// Result of one [`scan`].
pub struct ScanReport {
    pub counts: ScanCounts,
    /// Number of file rows written (or that would have been, in dry-run mode).
    pub written: usize,
    pub free: FileArena,
    pub grouped: Grouped,
}

fn snapshots_of(
    arena: &FileArena,
    container: Container<'_>,
    efforts: &HashMap<FileKey, ScanEffort>,
    previous: &Snapshot,
) -> Vec<FileSnapshot> {
    let mut snapshots = Vec::new();
    for (_, entity) in arena.iter() {
        let (Some(key), Some(record)) = (container.key(entity), container.record(entity)) else { continue };
        let Some(effort) = efforts.get(&key) else { continue };
        let renamed = previous.file(&key).is_some_and(|cached| cached.uuid != record.uuid);
        if *effort == ScanEffort::Cached && !renamed {
            continue;
        }
        snapshots.push(FileSnapshot {
            file: record,
            references: entity.references.iter().map(ReferenceRecord::from).collect(),
        });
    }
    snapshots
}

fn identity(package: &Package) -> Option<String> {
    let identity = package.identity_path().to_str().map(str::to_string);
    if identity.is_none() {
        tracing::warn!(package = %package.name, "skipping package without a UTF-8 path");
    }
    identity
}

/// Runs one incremental pass over `library`.
///
/// Only cache failures abort the pass; in that case nothing of it has been
/// persisted.
#[tracing::instrument(skip_all, fields(free = library.free.len(), packages = library.packages.len()))]
pub async fn scan(library: Library, repository: &Repository, options: &ScanOptions) -> Result<ScanReport> {
    let Library { mut free, free_reader, mut packages } = library;
    let previous = Snapshot::load(repository).await?;
    let parallelism = options.group.parallelism.get();
    let read_timeout = options.group.read_timeout;

    let mut counts = ScanCounts::default();
    let mut efforts = HashMap::new();
    let mut hashes = Vec::new();
    let free_scan =
        scan_collection(&mut free, Container(None), free_reader.as_ref(), &previous, parallelism, read_timeout).await;
    let mut scans = vec![free_scan];
    for (package, reader) in &mut packages {
        let Some(identity) = identity(package) else { continue };
        let container = Container(Some(&identity));
        let scan = scan_collection(package.files_mut(), container, reader.as_ref(), &previous, parallelism, read_timeout);
        scans.push(scan.await);
    }
    for scan in scans {
        counts.cached += scan.counts.cached;
        counts.processed += scan.counts.processed;
        counts.recalculated += scan.counts.recalculated;
        counts.read_failures += scan.counts.read_failures;
        counts.skipped += scan.counts.skipped;
        efforts.extend(scan.efforts);
        hashes.extend(scan.hashes);
    }

    let grouped = group_all(&mut free, free_reader.as_ref(), packages, &options.group)
        .await
        .or_raise(|| ErrorKind::Group)?;

    let mut snapshots = snapshots_of(&free, Container(None), &efforts, &previous);
    for grouped_package in &grouped.packages {
        let Some(identity) = identity(&grouped_package.package) else { continue };
        let files = grouped_package.package.files();
        snapshots.extend(snapshots_of(files, Container(Some(&identity)), &efforts, &previous));
    }

    if options.dry_run {
        tracing::info!(files = snapshots.len(), hashes = hashes.len(), "Skipping cache write during dry-run mode");
    } else {
        repository.append_hashes(&hashes).await.or_raise(|| ErrorKind::Cache)?;
        repository.write_snapshot(&snapshots).await.or_raise(|| ErrorKind::Cache)?;
    }
    tracing::info!(
        cached = counts.cached,
        processed = counts.processed,
        recalculated = counts.recalculated,
        read_failures = counts.read_failures,
        written = snapshots.len(),
        "scan complete"
    );
    Ok(ScanReport {
        counts,
        written: snapshots.len(),
        free,
        grouped,
    })
}

/// Opens the cache database at the configured location.
pub async fn open_cache(config: &Config) -> Result<(Database, Repository)> {
    let path = config.cache_path().or_raise(|| ErrorKind::Config)?;
    let db = Database::connect(&path).await.or_raise(|| ErrorKind::Cache)?;
    let repository = Repository::new(db.pool().clone(), config.dry_run);
    Ok((db, repository))
}

/// Scans the free files under `library_root` against the cache at
/// `cache_path`, with the tuning of `config`.
pub async fn scan_configured(config: &Config) -> Result<ScanReport> {
    let library = Library::open(config).await?;
    let (db, repository) = open_cache(config).await?;
    let report = scan(library, &repository, &ScanOptions::from(config)).await;
    db.close().await;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::num::NonZeroUsize;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;
    use time::UtcDateTime;
    use vamlib_model::FileEntity;
    use vamlib_storage::backend::MockBackend;

    const PRESET: &str = r#"{"uid": "Author:top", "storables": [{"id": "SELF:/Custom/Clothing/Female/top.vab"}]}"#;
    const VMI: &str = r#"{"displayName": "Smile",}"#;

    fn options(dry_run: bool) -> ScanOptions {
        ScanOptions {
            group: GroupOptions {
                parallelism: NonZeroUsize::new(2).unwrap(),
                read_timeout: Duration::from_secs(1),
            },
            dry_run,
        }
    }

    fn modified() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn library() -> Library {
        let free_files = [
            ("Custom/Clothing/Female/top.vam", PRESET),
            ("Custom/Clothing/Female/top.vab", "binary"),
            ("Saves/scene/a.json", r#"{"id": "Author.Morphs.1:/Custom/Atom/Person/Morphs/female/Smile.vmi"}"#),
        ];
        let mut free = FileArena::new();
        for (path, data) in free_files {
            free.insert(FileEntity::free(format!("/vam/{path}"), path, data.len() as u64, modified())).unwrap();
        }
        let free_reader: ReaderHandle = Arc::new(MockBackend::with_files(free_files));

        let vmi = "Custom/Atom/Person/Morphs/female/Smile.vmi";
        let mut package = Package::new("Author.Morphs.1".parse().unwrap(), "/vam/AddonPackages/Author.Morphs.1.var");
        package.add_file(vmi, VMI.len() as u64, modified()).unwrap();
        let reader: ReaderHandle = Arc::new(MockBackend::with_files([(vmi, VMI)]));
        Library {
            free,
            free_reader,
            packages: vec![(package, reader)],
        }
    }

    #[tokio::test]
    async fn test_first_pass_processes_everything() {
        let db = Database::connect_in_memory().await.unwrap();
        let repository = Repository::from(&db);
        let report = scan(library(), &repository, &options(false)).await.unwrap();

        assert_eq!(report.counts, ScanCounts { processed: 4, ..ScanCounts::default() });
        assert_eq!(report.written, 4);
        assert_eq!(repository.read_all_hashes().await.unwrap().len(), 4);

        let top = report.free.find("Custom/Clothing/Female/top.vam").unwrap();
        let top = report.free.get(top).unwrap();
        assert_eq!(top.uuid.as_deref(), Some("Author:top"));
        assert_eq!(top.children().len(), 1);
        assert_eq!(top.references.len(), 1);

        let morph = report.grouped.packages[0].package.files().top_level().next().unwrap();
        assert_eq!(morph.morph_name.as_deref(), Some("Smile"));
        let cached = repository
            .get_file("/vam/AddonPackages/Author.Morphs.1.var", "Custom/Atom/Person/Morphs/female/Smile.vmi")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.uuid.as_deref(), Some("Smile"));
    }

    #[tokio::test]
    async fn test_second_pass_is_served_from_cache() {
        let db = Database::connect_in_memory().await.unwrap();
        let repository = Repository::from(&db);
        scan(library(), &repository, &options(false)).await.unwrap();

        let report = scan(library(), &repository, &options(false)).await.unwrap();
        assert_eq!(report.counts, ScanCounts { cached: 4, ..ScanCounts::default() });
        assert_eq!(report.written, 0);
        // Nothing was read, so no new hashes either.
        assert_eq!(repository.read_all_hashes().await.unwrap().len(), 4);
        let top = report.free.find("Custom/Clothing/Female/top.vam").unwrap();
        let top = report.free.get(top).unwrap();
        assert_eq!(top.uuid.as_deref(), Some("Author:top"));
        assert_eq!(top.references[0].local_path, "Custom/Clothing/Female/top.vab");
        let morph = report.grouped.packages[0].package.files().top_level().next().unwrap();
        assert_eq!(morph.morph_name.as_deref(), Some("Smile"));
    }

    #[tokio::test]
    async fn test_changed_file_is_recalculated() {
        let db = Database::connect_in_memory().await.unwrap();
        let repository = Repository::from(&db);
        scan(library(), &repository, &options(false)).await.unwrap();

        let mut changed = library();
        let mut free = FileArena::new();
        for (_, entity) in changed.free.iter() {
            let size = match entity.path() {
                "Saves/scene/a.json" => 1,
                _ => entity.size(),
            };
            free.insert(FileEntity::free(entity.full_path().unwrap(), entity.path(), size, modified())).unwrap();
        }
        changed.free = free;
        let report = scan(changed, &repository, &options(false)).await.unwrap();
        assert_eq!(report.counts.recalculated, 1);
        assert_eq!(report.counts.cached, 3);
        assert_eq!(report.written, 1);
        assert_eq!(repository.read_all_files().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_read_is_retried_on_the_next_pass() {
        let scene = r#"{"id": "Author.Morphs.1:/Custom/Atom/Person/Morphs/female/Smile.vmi"}"#;
        let library_with = |reader: MockBackend| {
            let mut free = FileArena::new();
            let path = "Saves/scene/a.json";
            free.insert(FileEntity::free(format!("/vam/{path}"), path, scene.len() as u64, modified())).unwrap();
            Library {
                free,
                free_reader: Arc::new(reader),
                packages: Vec::new(),
            }
        };
        let db = Database::connect_in_memory().await.unwrap();
        let repository = Repository::from(&db);

        let report = scan(library_with(MockBackend::default()), &repository, &options(false)).await.unwrap();
        assert_eq!(report.counts, ScanCounts { processed: 1, read_failures: 1, ..ScanCounts::default() });
        assert_eq!(report.written, 0);
        assert!(repository.read_all_files().await.unwrap().is_empty());

        // Same size and modification time, now readable.
        let reader = MockBackend::with_files([("Saves/scene/a.json", scene)]);
        let report = scan(library_with(reader), &repository, &options(false)).await.unwrap();
        assert_eq!(report.counts, ScanCounts { processed: 1, ..ScanCounts::default() });
        assert_eq!(report.written, 1);
        let file = report.free.top_level().next().unwrap();
        assert_eq!(file.references.len(), 1);
        assert_eq!(repository.read_all_references().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_persists_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        let repository = Repository::from(&db);
        let report = scan(library(), &repository, &options(true)).await.unwrap();
        assert_eq!(report.written, 4);
        assert!(repository.read_all_files().await.unwrap().is_empty());
        assert!(repository.read_all_hashes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discover() {
        let reader: ReaderHandle = Arc::new(MockBackend::with_files([
            ("Saves/scene/a.json", "{}"),
            ("Custom/Scripts/a.cs", ""),
        ]));
        let library = Library::discover(reader, Some("Saves")).await.unwrap();
        assert_eq!(library.free.len(), 1);
        assert!(library.free.find("saves/scene/A.json").is_some());
        assert!(library.packages.is_empty());
    }

    #[tokio::test]
    async fn test_scan_configured() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("vam");
        for (path, data) in [
            ("Custom/Clothing/Female/top.vam", PRESET),
            ("Custom/Clothing/Female/top.vab", "binary"),
        ] {
            let full = root.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, data).unwrap();
        }
        let config = Config {
            library_root: Some(root),
            cache_path: Some(dir.path().join("cache/cache.sqlite")),
            parallelism: 2,
            ..Config::default()
        };

        let report = scan_configured(&config).await.unwrap();
        assert_eq!(report.counts.processed, 2);
        assert_eq!(report.grouped.free.top_level.len(), 1);
        let report = scan_configured(&config).await.unwrap();
        assert_eq!(report.counts, ScanCounts { cached: 2, ..ScanCounts::default() });

        let (db, repository) = open_cache(&config).await.unwrap();
        assert_eq!(repository.read_all_files().await.unwrap().len(), 2);
        db.close().await;
    }

    #[rstest]
    #[case::no_root(None)]
    #[case::relative_root(Some(PathBuf::from("relative/vam")))]
    #[tokio::test]
    async fn test_open_needs_an_absolute_root(#[case] library_root: Option<PathBuf>) {
        let config = Config {
            library_root,
            ..Config::default()
        };
        let Err(err) = Library::open(&config).await else { panic!("library opened without a usable root") };
        assert!(matches!(&*err, ErrorKind::Config));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config {
            parallelism: 3,
            read_timeout_ms: 250,
            dry_run: true,
            ..Config::default()
        };
        let options = ScanOptions::from(&config);
        assert_eq!(options.group.parallelism.get(), 3);
        assert_eq!(options.group.read_timeout, Duration::from_millis(250));
        assert!(options.dry_run);
    }
}
