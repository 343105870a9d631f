//! Session lifecycle: creation, resume and teardown.

mod manager;
mod types;

use serde_json::Value;
use tracing::warn;

use trollbuddy_core::store::{RemoteStore, StoreError, paths};

pub use manager::{ActiveSession, SessionManager, StartOutcome};
pub use types::{FieldError, FormErrors, Session, SessionForm, SessionRecord, ValidatedForm};

/// Scan the session collection for records whose `field` equals `value`.
///
/// The collection is keyed by store-assigned keys, so lookups by any record
/// field are necessarily a linear scan. Records that match but cannot be
/// decoded are skipped with a warning.
pub(crate) async fn find_sessions_by_field(
    store: &dyn RemoteStore,
    field: &str,
    value: &str,
) -> Result<Vec<Session>, StoreError> {
    let children = store.children(paths::SESSIONS).await?;

    let mut found = Vec::new();
    for (store_key, raw) in children {
        if raw.get(field).and_then(Value::as_str) != Some(value) {
            continue;
        }
        match serde_json::from_value::<SessionRecord>(raw) {
            Ok(record) => found.push(Session { store_key, record }),
            Err(e) => warn!(
                store_key = %store_key,
                error = %e,
                "Skipping undecodable session record"
            ),
        }
    }

    Ok(found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use trollbuddy_core::store::MemoryStore;

    #[tokio::test]
    async fn scan_matches_on_field() {
        let store = MemoryStore::new();
        store
            .set(
                "sessions/k1",
                json!({"sessionId": "s-1", "userId": "u-1", "name": "Ann", "age": 9}),
            )
            .await
            .unwrap();
        store
            .set(
                "sessions/k2",
                json!({"sessionId": "s-2", "userId": "u-2", "name": "Bo", "age": 10}),
            )
            .await
            .unwrap();

        let found = find_sessions_by_field(&store, "userId", "u-2").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].store_key, "k2");
        assert_eq!(found[0].session_id(), "s-2");
    }

    #[tokio::test]
    async fn scan_skips_malformed_records() {
        let store = MemoryStore::new();
        store
            .set("sessions/k1", json!({"sessionId": "s-1", "userId": "u-1"}))
            .await
            .unwrap();
        let found = find_sessions_by_field(&store, "sessionId", "s-1").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn scan_of_empty_store_is_empty() {
        let store = MemoryStore::new();
        let found = find_sessions_by_field(&store, "userId", "u-1").await.unwrap();
        assert!(found.is_empty());
    }
}
