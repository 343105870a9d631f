//! Read access to a session's remote images.

use serde_json::Value;
use tracing::debug;

use trollbuddy_core::store::{RemoteStore, StoreError, paths};

use crate::capture::{CapturedImage, parse_timestamp_key};

/// The `limit` most recent images of a session, newest first.
///
/// Entries whose key is not a timestamp or whose value is not a data URL
/// are skipped.
pub async fn latest_images(
    store: &dyn RemoteStore,
    session_id: &str,
    limit: usize,
) -> Result<Vec<CapturedImage>, StoreError> {
    let children = store.children(&paths::captured_images(session_id)).await?;

    let mut images: Vec<CapturedImage> = children
        .into_iter()
        .filter_map(|(key, value)| {
            let captured_at = parse_timestamp_key(&key);
            match (captured_at, value) {
                (Some(captured_at), Value::String(data_url)) => Some(CapturedImage {
                    captured_at,
                    data_url,
                }),
                _ => {
                    debug!(session_id, key = %key, "Skipping unrecognised image entry");
                    None
                }
            }
        })
        .collect();

    images.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    images.truncate(limit);
    Ok(images)
}
