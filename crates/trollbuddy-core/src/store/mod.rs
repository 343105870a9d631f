//! Remote key-path store.
//!
//! The store is a JSON document tree addressed by slash-delimited paths, in
//! the style of a realtime database. Only five primitives are needed by the
//! session and capture components: `get`, `push`, `set`, `remove` and
//! `children` (immediate children with their keys intact).
//!
//! Backends:
//! - [`MemoryStore`]: in-process tree, used by tests and single-process runs.
//! - [`SqliteStore`]: document tree persisted in a local `SQLite` file so that
//!   several processes on one machine can share a store.
//! - [`FirebaseStore`]: Firebase Realtime Database over its REST API.

mod firebase;
mod memory;
mod sqlite;
pub mod tree;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::{self, StoreBackend, StoreConfig};
use crate::db::DatabaseError;

pub use firebase::{FirebaseConfig, FirebaseStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors returned by store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid store path '{0}'")]
    InvalidPath(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected store response: {0}")]
    Response(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}

/// Asynchronous key-path store contract.
///
/// Writes are last-write-wins per path; there are no conditional writes.
/// Writing `null` or an empty object removes the node, and removing the last
/// child of a node removes the node itself.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the value at `path`. `None` when nothing is stored there.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Append `record` under a new store-generated key and return that key.
    async fn push(&self, path: &str, record: Value) -> Result<String, StoreError>;

    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Delete `path` and everything below it. Removing a missing path is not
    /// an error.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Immediate children of `path` as `(key, value)` pairs.
    async fn children(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(match self.get(path).await? {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => Vec::new(),
        })
    }
}

/// Open the backend selected by `config`.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RemoteStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = config
                .sqlite_path
                .clone()
                .or_else(config::default_store_path)
                .ok_or_else(|| {
                    StoreError::Unavailable("no data directory for the SQLite store".into())
                })?;
            Ok(Arc::new(SqliteStore::open(&path).await?))
        }
        StoreBackend::Firebase => {
            let database_url = config
                .database_url
                .clone()
                .filter(|url| !url.is_empty())
                .ok_or_else(|| StoreError::Unavailable("store.database_url is not set".into()))?;
            let store = FirebaseStore::new(&FirebaseConfig {
                database_url,
                auth_token: config.auth_token.clone(),
            })?;
            info!("Using Firebase store");
            Ok(Arc::new(store))
        }
    }
}

/// Path layout shared by every client of a store.
pub mod paths {
    /// Collection of session records, keyed by store-assigned key.
    pub const SESSIONS: &str = "sessions";

    /// Collection of per-session image collections, keyed by session id.
    pub const CAPTURED_IMAGES: &str = "capturedImages";

    pub fn session_record(store_key: &str) -> String {
        format!("{SESSIONS}/{store_key}")
    }

    pub fn captured_images(session_id: &str) -> String {
        format!("{CAPTURED_IMAGES}/{session_id}")
    }

    pub fn captured_image(session_id: &str, captured_at: i64) -> String {
        format!("{CAPTURED_IMAGES}/{session_id}/{captured_at}")
    }
}
