//! Connections to the playlist database.
//!
//! Appends come from one scan session at a time while listings may be read
//! concurrently, so a file database gets two pools: a single-connection
//! writer and a read-only reader pool. WAL keeps readers off the writer's
//! lock.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
const READERS: u32 = 4;
// A scan appends in bursts of one transaction per batch.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct Database {
    writer: SqlitePool,
    reader: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the playlist at `path` and bring its schema
    /// up to date.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let writer = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);
        let writer = pool(writer, 1).await?;
        migrate(&writer).await?;

        // The file exists and is migrated by now.
        let reader = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .busy_timeout(BUSY_TIMEOUT);
        let reader = pool(reader, READERS).await?;
        Ok(Self { writer, reader })
    }

    /// A private in-memory playlist. Reads and writes share its only
    /// connection; a second one would see a different, empty database.
    ///
    /// Not `#[cfg(test)]`: other crates' tests use it too.
    pub async fn connect_in_memory() -> Result<Self> {
        let writer = pool(SqliteConnectOptions::new().filename(":memory:"), 1).await?;
        migrate(&writer).await?;
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    /// Pool for appends. Holds a single connection.
    pub fn writer(&self) -> &SqlitePool {
        &self.writer
    }

    /// Pool for listings and lookups.
    pub fn reader(&self) -> &SqlitePool {
        &self.reader
    }

    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.writer).await;
        self.reader.close().await;
        self.writer.close().await;
    }
}

async fn pool(options: SqliteConnectOptions, max: u32) -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(max)
        .connect_with(options)
        .await
        .or_raise(|| ErrorKind::Database)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    MIGRATOR.run(pool).await.or_raise(|| ErrorKind::Migration)?;
    debug!("Playlist schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSERT: &str = "INSERT INTO playlist (location, title, duration_ms, position) VALUES (?, 'Song', ?, 0)";

    async fn count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM playlist").fetch_one(pool).await.unwrap();
        count
    }

    #[tokio::test]
    async fn test_schema() {
        let db = Database::connect_in_memory().await.unwrap();
        let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('playlist') ORDER BY cid")
            .fetch_all(db.reader())
            .await
            .unwrap();
        let columns: Vec<_> = columns.into_iter().map(|(name,)| name).collect();
        assert_eq!(columns, ["id", "location", "title", "author", "duration_ms", "position"]);

        let negative = sqlx::query(INSERT).bind("file:///a.pt3").bind(-1).execute(db.writer()).await;
        assert!(negative.is_err());
        db.close().await;
    }

    #[tokio::test]
    async fn test_reader_sees_writes_but_cannot_write() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("playlist.sqlite")).await.unwrap();
        sqlx::query(INSERT).bind("file:///a.pt3").bind(1000).execute(db.writer()).await.unwrap();
        assert_eq!(count(db.reader()).await, 1);

        let write = sqlx::query(INSERT).bind("file:///b.pt3").bind(1000).execute(db.reader()).await;
        assert!(write.is_err());
        assert_eq!(count(db.writer()).await, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.sqlite");
        let db = Database::connect(&path).await.unwrap();
        sqlx::query(INSERT).bind("file:///a.pt3").bind(1000).execute(db.writer()).await.unwrap();
        db.close().await;

        let db = Database::connect(&path).await.unwrap();
        assert_eq!(count(db.reader()).await, 1);
        db.close().await;
    }
}
