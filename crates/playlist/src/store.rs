//! The playlist store: an ordered list of items, appended by scans.
//!
//! Only two operations matter to the rest of the system, so that is all
//! [`PlaylistStore`] asks for. [`SqliteStore`] is the persistent
//! implementation; [`MemoryStore`] is for tests and throwaway sessions.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{ItemRow, PlaylistItem, StoredItem, duration_ms};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Append items at the end, in order. Returns how many were stored.
    async fn append(&self, items: &[PlaylistItem]) -> Result<usize>;

    /// Every stored item in playlist order.
    async fn enumerate(&self) -> Result<Vec<StoredItem>>;

    /// Single item by row id.
    async fn get(&self, id: i64) -> Result<Option<StoredItem>> {
        Ok(self.enumerate().await?.into_iter().find(|stored| stored.id == id))
    }
}

/// Shared handle to any store.
pub type StoreHandle = Arc<dyn PlaylistStore>;

/// SQLite-backed store. Appends go through the database's writer, everything
/// else through its readers.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    writer: SqlitePool,
    reader: SqlitePool,
}

impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self {
            writer: db.writer().clone(),
            reader: db.reader().clone(),
        }
    }
}

impl SqliteStore {
    pub async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as(include_str!("../queries/count_items.sql"))
            .fetch_one(&self.reader)
            .await
            .or_raise(|| ErrorKind::Database)?;
        usize::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }
}

#[async_trait]
impl PlaylistStore for SqliteStore {
    #[instrument(level = "debug", skip_all, fields(count = items.len()))]
    async fn append(&self, items: &[PlaylistItem]) -> Result<usize> {
        let mut tx = self.writer.begin().await.or_raise(|| ErrorKind::Database)?;
        for item in items {
            sqlx::query(include_str!("../queries/append_item.sql"))
                .bind(item.location.to_string())
                .bind(&item.title)
                .bind(&item.author)
                .bind(duration_ms(item.duration)?)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(items.len())
    }

    async fn enumerate(&self) -> Result<Vec<StoredItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../queries/list_items.sql"))
            .fetch_all(&self.reader)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(StoredItem::try_from).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<StoredItem>> {
        let row: Option<ItemRow> = sqlx::query_as(include_str!("../queries/get_item.sql"))
            .bind(id)
            .fetch_optional(&self.reader)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(StoredItem::try_from).transpose()
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<Vec<StoredItem>>,
}

impl MemoryStore {
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl PlaylistStore for MemoryStore {
    async fn append(&self, items: &[PlaylistItem]) -> Result<usize> {
        let mut guard = self.items.write().await;
        for item in items {
            let id = guard.len() as i64 + 1;
            guard.push(StoredItem { id, item: item.clone() });
        }
        Ok(items.len())
    }

    async fn enumerate(&self) -> Result<Vec<StoredItem>> {
        Ok(self.items.read().await.clone())
    }
}
