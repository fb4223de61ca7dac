use crate::error::{ErrorKind, Result};
use crate::extract::{extract_references, is_scanned};
use exn::ResultExt;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use vamlib_cache::{FileKey, FileRecord, HashRecord, ReferenceRecord, Repository};
use vamlib_model::taxonomy::MORPH_EXTENSIONS;
use vamlib_model::{FileArena, FileEntity, FileId, ParsedReference};
use vamlib_storage::PayloadReader;

/// Indicates how much work was required to produce a file's references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanEffort {
    /// Same size and modification time as the cached row: nothing was read.
    Cached,
    /// The file was cached but has changed on disk, so it was read again.
    Recalculated,
    /// No cached row existed for this file.
    Processed,
}

/// The cache state from before this pass.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    files: HashMap<FileKey, FileRecord>,
    references: HashMap<FileKey, Vec<ReferenceRecord>>,
}
impl Snapshot {
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) async fn load(repository: &Repository) -> Result<Self> {
        let files = repository.read_all_files().await.or_raise(|| ErrorKind::Cache)?;
        let mut snapshot = Self {
            files: files.into_iter().map(|file| (file.key(), file)).collect(),
            references: HashMap::new(),
        };
        for (owner, reference) in repository.read_all_references().await.or_raise(|| ErrorKind::Cache)? {
            snapshot.references.entry(owner).or_default().push(reference);
        }
        tracing::debug!(files = snapshot.files.len(), "loaded cache snapshot");
        Ok(snapshot)
    }

    pub(crate) fn file(&self, key: &FileKey) -> Option<&FileRecord> {
        self.files.get(key)
    }
}

/// Where the files of one collection live: `None` for free files, the
/// package's identity path otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Container<'a>(pub Option<&'a str>);
impl Container<'_> {
    pub(crate) fn key(&self, entity: &FileEntity) -> Option<FileKey> {
        match self.0 {
            Some(package) => Some(FileKey::new(package, entity.path())),
            None => FileKey::free(entity),
        }
    }

    pub(crate) fn record(&self, entity: &FileEntity) -> Option<FileRecord> {
        match self.0 {
            Some(package) => FileRecord::for_entity(Path::new(package), entity.path(), entity),
            None => FileRecord::for_entity(entity.full_path()?, "", entity),
        }
    }

    fn hash(&self, entity: &FileEntity, hash: String) -> Option<HashRecord> {
        let (full_path, local_path) = match self.0 {
            Some(package) => (package.to_string(), entity.path().to_string()),
            None => (entity.full_path()?.to_str()?.to_string(), String::new()),
        };
        Some(HashRecord { full_path, local_path, hash })
    }
}

/// Tally of one or more collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub cached: usize,
    pub processed: usize,
    pub recalculated: usize,
    /// Files that had to be read but couldn't be. They carry no references
    /// and get no cache row, so the next pass reads them again.
    pub read_failures: usize,
    /// Files skipped for having no UTF-8 path.
    pub skipped: usize,
}
impl ScanCounts {
    fn count(&mut self, effort: ScanEffort) {
        match effort {
            ScanEffort::Cached => self.cached += 1,
            ScanEffort::Recalculated => self.recalculated += 1,
            ScanEffort::Processed => self.processed += 1,
        }
    }
}

/// What scanning one collection produced besides updated entities.
#[derive(Debug, Default)]
pub(crate) struct CollectionScan {
    pub efforts: HashMap<FileKey, ScanEffort>,
    pub hashes: Vec<HashRecord>,
    pub counts: ScanCounts,
}

fn restore(entity: &mut FileEntity, cached: &FileRecord, references: Option<&Vec<ReferenceRecord>>) {
    let is_morph = MORPH_EXTENSIONS.iter().any(|ext| *ext == entity.extension());
    match is_morph {
        true => entity.morph_name = cached.uuid.clone(),
        false => entity.uuid = cached.uuid.clone(),
    }
    entity.references = references.map(|refs| refs.iter().map(ReferenceRecord::to_parsed).collect()).unwrap_or_default();
}

struct Job {
    id: FileId,
    key: FileKey,
    path: String,
    scanned: bool,
    effort: ScanEffort,
}

struct Read {
    hash: String,
    references: Vec<ParsedReference>,
}

/// Brings the references of every file in `arena` up to date.
///
/// Unchanged files are restored from `snapshot`. The others are read, up to
/// `parallelism` at a time, hashed with BLAKE3 and, if they are of a
/// [scanned](crate::SCANNED_EXTENSIONS) kind, searched for references.
#[tracing::instrument(level = "debug", skip_all, fields(collection = reader.name(), files = arena.len()))]
pub(crate) async fn scan_collection(
    arena: &mut FileArena,
    container: Container<'_>,
    reader: &dyn PayloadReader,
    snapshot: &Snapshot,
    parallelism: usize,
    read_timeout: Duration,
) -> CollectionScan {
    let mut scan = CollectionScan::default();
    let mut jobs = Vec::new();
    for (id, entity) in arena.iter_mut() {
        let Some(key) = container.key(entity) else {
            tracing::warn!(collection = reader.name(), path = entity.path(), "skipping file without a UTF-8 path");
            scan.counts.skipped += 1;
            continue;
        };
        let effort = match snapshot.file(&key) {
            Some(cached) if cached.is_unchanged(entity.size(), entity.modified()) => {
                restore(entity, cached, snapshot.references.get(&key));
                scan.counts.count(ScanEffort::Cached);
                scan.efforts.insert(key, ScanEffort::Cached);
                continue;
            },
            Some(_) => ScanEffort::Recalculated,
            None => ScanEffort::Processed,
        };
        jobs.push(Job {
            id,
            key,
            path: entity.path().to_string(),
            scanned: is_scanned(entity.extension()),
            effort,
        });
    }

    let results = stream::iter(jobs)
        .map(|job| async move {
            let read = match tokio::time::timeout(read_timeout, reader.read(&job.path)).await {
                Ok(Ok(payload)) => Some(Read {
                    hash: blake3::hash(&payload).to_string(),
                    references: match job.scanned {
                        true => extract_references(&payload),
                        false => Vec::new(),
                    },
                }),
                Ok(Err(e)) => {
                    tracing::warn!(collection = reader.name(), path = %job.path, error = ?e, "could not read file");
                    None
                },
                Err(_) => {
                    tracing::warn!(collection = reader.name(), path = %job.path, ?read_timeout, "file read timed out");
                    None
                },
            };
            (job, read)
        })
        .buffer_unordered(parallelism)
        .collect::<Vec<_>>()
        .await;

    for (job, read) in results {
        scan.counts.count(job.effort);
        let Some(entity) = arena.get_mut(job.id) else { continue };
        let Some(read) = read else {
            // No effort: the file stays out of the cache until a read succeeds.
            entity.references = Vec::new();
            scan.counts.read_failures += 1;
            continue;
        };
        tracing::debug!(path = %job.path, references = read.references.len(), effort = ?job.effort, "file scanned");
        entity.references = read.references;
        scan.hashes.extend(container.hash(entity, read.hash));
        scan.efforts.insert(job.key, job.effort);
    }
    scan
}
