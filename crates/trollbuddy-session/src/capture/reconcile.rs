//! Trim a session's remote image collection to its most recent entries.

use tracing::{debug, warn};

use trollbuddy_core::store::{RemoteStore, StoreError, paths};

use super::parse_timestamp_key;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries left in the collection, as far as this pass knows.
    pub kept: usize,
    /// Keys removed by this pass.
    pub removed: Vec<String>,
    /// Keys that should have been removed but could not be.
    pub failed: Vec<String>,
}

/// Keep the `keep` entries with the largest timestamp keys and delete the
/// rest. Keys that are not timestamps rank below every timestamp.
///
/// Only listing the collection is fatal. Individual deletes that fail are
/// reported; the next pass picks them up again.
pub async fn reconcile(
    store: &dyn RemoteStore,
    session_id: &str,
    keep: usize,
) -> Result<ReconcileReport, StoreError> {
    let collection = paths::captured_images(session_id);
    let children = store.children(&collection).await?;

    let mut keys: Vec<(Option<i64>, String)> = children
        .into_iter()
        .map(|(key, _)| (parse_timestamp_key(&key), key))
        .collect();
    keys.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let stale = keys.split_off(keep.min(keys.len()));
    let mut report = ReconcileReport {
        kept: keys.len(),
        ..ReconcileReport::default()
    };

    for (_, key) in stale {
        let path = format!("{collection}/{key}");
        match store.remove(&path).await {
            Ok(()) => {
                debug!(session_id, key = %key, "Removed stale image");
                report.removed.push(key);
            }
            Err(e) => {
                warn!(session_id, key = %key, error = %e, "Failed to remove stale image");
                report.failed.push(key);
            }
        }
    }

    Ok(report)
}
