//! Connection pool and schema management for the cache database.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// One writer plus a few snapshot readers.
const MAX_CONNECTIONS: u32 = 5;
/// A snapshot write of a large library holds the only writer slot for a while.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Row counts of the cache tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct Usage {
    pub files: i64,
    pub references: i64,
    pub hashes: i64,
}

/// The cache database.
///
/// Deleting the file is always safe: the next scan processes every file
/// again and rebuilds it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the cache database at `path`, creating missing
    /// parent directories, and migrates it.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.or_raise(|| ErrorKind::CacheDir(dir.to_path_buf()))?;
        }
        let options = Self::options().filename(path).create_if_missing(true);
        let db = Self::open(options, MAX_CONNECTIONS).await?;
        let usage = db.usage().await?;
        tracing::debug!(files = usage.files, references = usage.references, hashes = usage.hashes, "cache opened");
        Ok(db)
    }

    /// Opens a fresh in-memory database, for dry runs and tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every in-memory connection is its own database.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::tune(conn, meta).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // References cascade with their owning file.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    /// Per-connection settings sized for loading the whole snapshot at once.
    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
                PRAGMA mmap_size = 33554432;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("migrating cache database", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// How many files, references and hashes are cached.
    pub async fn usage(&self) -> Result<Usage> {
        sqlx::query_as(include_str!("../queries/usage.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for every connection to return to the pool, then closes it.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vamlib/cache/cache.sqlite");
        let db = Database::connect(&path).await.unwrap();
        assert!(path.is_file());
        assert_eq!(db.usage().await.unwrap(), Usage::default());
        db.close().await;

        // Reopening keeps the schema and runs no migration twice.
        let db = Database::connect(&path).await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let db = Database::connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1);
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 800);
        db.close().await;
    }

    #[tokio::test]
    async fn test_references_cascade_with_their_file() {
        let db = Database::connect_in_memory().await.unwrap();
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO Files (Path, LocalPath, FileSize, ModifiedTime) VALUES ('/vam/a.json', '', 1, 0) RETURNING Id",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO JsonReferences (Value, \"Index\", Length, ParentFileId) VALUES ('Custom/a.vam', 0, 12, ?)")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();
        let usage = db.usage().await.unwrap();
        assert_eq!((usage.files, usage.references), (1, 1));
        // Paths compare case-insensitively.
        sqlx::query("DELETE FROM Files WHERE Path = '/VAM/A.JSON'").execute(db.pool()).await.unwrap();
        assert_eq!(db.usage().await.unwrap(), Usage::default());
        db.close().await;
    }
}
