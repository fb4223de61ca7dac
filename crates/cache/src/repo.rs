//! Repository for cached files, their references and content hashes.
//!
//! Files and references are tightly coupled: a reference row can't exist
//! without the file row it was extracted from, and rewriting a file always
//! replaces its references wholesale.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRow, HashRow, ReferenceRow};
use crate::record::{FileKey, FileRecord, FileSnapshot, HashRecord, ReferenceRecord};
use exn::{OptionExt, ResultExt};
use sqlx::{SqliteConnection, SqlitePool};

/// Repository for managing the incremental scan cache.
///
/// Every write is one transaction: either the whole batch lands or, on error,
/// nothing does. In dry-run mode writes succeed without touching the
/// database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn upsert_file(conn: &mut SqliteConnection, file: &FileRecord) -> Result<i64> {
        let row = FileRow::try_from(file)?;
        let (id,): (i64,) = sqlx::query_as(include_str!("../queries/upsert_file.sql"))
            .bind(row.path)
            .bind(row.local_path)
            .bind(row.uuid)
            .bind(row.file_size)
            .bind(row.modified_time)
            .fetch_one(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    async fn replace_references(conn: &mut SqliteConnection, file_id: i64, references: &[ReferenceRecord]) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_references.sql"))
            .bind(file_id)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for reference in references {
            let offset = i64::try_from(reference.offset).or_raise(|| ErrorKind::InvalidData("reference offset"))?;
            let length = i64::try_from(reference.length).or_raise(|| ErrorKind::InvalidData("reference length"))?;
            sqlx::query(include_str!("../queries/insert_reference.sql"))
                .bind(&reference.value)
                .bind(offset)
                .bind(length)
                .bind(&reference.morph_name)
                .bind(&reference.internal_id)
                .bind(file_id)
                .execute(&mut *conn)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    async fn find_file_id(conn: &mut SqliteConnection, path: &str, local_path: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(include_str!("../queries/find_file_id.sql"))
            .bind(path)
            .bind(local_path)
            .fetch_optional(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(id,)| id))
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Every cached file row.
    pub async fn read_all_files(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/read_all_files.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    /// Every cached reference, with the identity of the file that owns it, in
    /// payload order per file.
    pub async fn read_all_references(&self) -> Result<Vec<(FileKey, ReferenceRecord)>> {
        let rows: Vec<ReferenceRow> = sqlx::query_as(include_str!("../queries/read_all_references.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(<(FileKey, ReferenceRecord)>::try_from).collect()
    }

    /// One cached file by its identity; `local_path` is empty for free files.
    pub async fn get_file(&self, path: impl AsRef<str>, local_path: impl AsRef<str>) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(path.as_ref())
            .bind(local_path.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Every recorded content hash, oldest first.
    pub async fn read_all_hashes(&self) -> Result<Vec<HashRecord>> {
        let rows: Vec<HashRow> = sqlx::query_as(include_str!("../queries/read_all_hashes.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(HashRecord::from).collect())
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Inserts or updates a batch of file rows. Existing references are kept.
    pub async fn write_files(&self, files: &[FileRecord]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for file in files {
            Self::upsert_file(&mut tx, file).await?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Replaces the references of every file named in the batch.
    ///
    /// Returns [`ErrorKind::FileNotFound`] (and writes nothing) if one of the
    /// owning files has no row yet.
    pub async fn write_references(&self, references: &[(FileKey, Vec<ReferenceRecord>)]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for (owner, records) in references {
            let file_id = Self::find_file_id(&mut tx, owner.path(), owner.local_path())
                .await?
                .ok_or_raise(|| ErrorKind::FileNotFound(owner.path().to_string(), owner.local_path().to_string()))?;
            Self::replace_references(&mut tx, file_id, records).await?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Writes file rows and their complete reference sets in one transaction.
    ///
    /// The old references of every rewritten file are deleted first.
    #[tracing::instrument(level = "debug", skip_all, fields(files = snapshots.len()))]
    pub async fn write_snapshot(&self, snapshots: &[FileSnapshot]) -> Result<()> {
        if self.dry_run {
            tracing::info!(files = snapshots.len(), "Skipping cache write during dry-run mode");
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for snapshot in snapshots {
            let file_id = Self::upsert_file(&mut tx, &snapshot.file).await?;
            Self::replace_references(&mut tx, file_id, &snapshot.references).await?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Appends content hashes; existing rows are never updated.
    pub async fn append_hashes(&self, hashes: &[HashRecord]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for hash in hashes {
            sqlx::query(include_str!("../queries/insert_hash.sql"))
                .bind(&hash.full_path)
                .bind(&hash.local_path)
                .bind(&hash.hash)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Drops every file, reference and hash row.
    pub async fn clear(&self) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
