//! `SQLite` store backend.
//!
//! The document tree is stored flattened: every leaf (any non-object JSON
//! value) is one row keyed by its full path. Reads rebuild the subtree below
//! the requested path; writes replace a subtree inside a transaction.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{debug, info};

use super::{RemoteStore, StoreError, tree};
use crate::db::{self, DatabaseError, unix_timestamp_millis};
use crate::ids;

/// Store backed by a local `SQLite` database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let pool = db::open_pool(path).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = db::open_pool_in_memory().await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Store migrations complete");
        Ok(())
    }

    /// Delete the subtree at `path` and any leaf stored at one of its
    /// ancestors (a leaf ancestor would shadow the new subtree).
    async fn clear_subtree(
        tx: &mut Transaction<'_, Sqlite>,
        segments: &[&str],
    ) -> Result<u64, StoreError> {
        if segments.is_empty() {
            let done = sqlx::query("DELETE FROM store_nodes")
                .execute(&mut **tx)
                .await?;
            return Ok(done.rows_affected());
        }

        let path = tree::join(segments);
        let prefix = format!("{path}/");
        #[allow(clippy::cast_possible_wrap)]
        let prefix_len = prefix.chars().count() as i64;
        let done = sqlx::query(
            "DELETE FROM store_nodes WHERE path = ?1 OR substr(path, 1, ?2) = ?3",
        )
        .bind(&path)
        .bind(prefix_len)
        .bind(&prefix)
        .execute(&mut **tx)
        .await?;

        for end in 1..segments.len() {
            sqlx::query("DELETE FROM store_nodes WHERE path = ?1")
                .bind(tree::join(&segments[..end]))
                .execute(&mut **tx)
                .await?;
        }

        Ok(done.rows_affected())
    }

    async fn write_subtree(&self, segments: &[&str], value: Value) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::clear_subtree(&mut tx, segments).await?;

        if let Some(value) = tree::normalize(value) {
            let mut leaves = Vec::new();
            tree::flatten(&tree::join(segments), &value, &mut leaves);
            let now = unix_timestamp_millis();
            for (path, leaf) in leaves {
                sqlx::query("INSERT INTO store_nodes (path, value, updated_at) VALUES (?1, ?2, ?3)")
                    .bind(path)
                    .bind(serde_json::to_string(&leaf)?)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = tree::split(path)?;

        let rows: Vec<(String, String)> = if segments.is_empty() {
            sqlx::query_as("SELECT path, value FROM store_nodes")
                .fetch_all(&self.pool)
                .await?
        } else {
            let path = tree::join(&segments);
            let prefix = format!("{path}/");
            #[allow(clippy::cast_possible_wrap)]
            let prefix_len = prefix.chars().count() as i64;
            sqlx::query_as(
                "SELECT path, value FROM store_nodes WHERE path = ?1 OR substr(path, 1, ?2) = ?3",
            )
            .bind(&path)
            .bind(prefix_len)
            .bind(&prefix)
            .fetch_all(&self.pool)
            .await?
        };

        if rows.is_empty() {
            return Ok(None);
        }

        let depth = segments.len();
        let mut root = Value::Object(Map::new());
        for (row_path, raw) in rows {
            let leaf: Value = serde_json::from_str(&raw)?;
            let row_segments: Vec<&str> = row_path.split('/').collect();
            if row_segments.len() == depth {
                return Ok(Some(leaf));
            }
            tree::set_at(&mut root, &row_segments[depth..], Some(leaf));
        }

        Ok(tree::normalize(root))
    }

    async fn push(&self, path: &str, record: Value) -> Result<String, StoreError> {
        let key = ids::push_key();
        let mut segments = tree::split(path)?;
        segments.push(&key);
        self.write_subtree(&segments, record).await?;
        debug!(path, key = %key, "Pushed record");
        Ok(key)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = tree::split(path)?;
        self.write_subtree(&segments, value).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segments = tree::split(path)?;
        let mut tx = self.pool.begin().await?;
        let removed = Self::clear_subtree(&mut tx, &segments).await?;
        tx.commit().await?;
        debug!(path, removed, "Removed subtree");
        Ok(())
    }
}
