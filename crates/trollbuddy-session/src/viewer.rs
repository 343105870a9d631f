//! Session resolution for clients that open a share link.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use trollbuddy_core::config::SessionConfig;
use trollbuddy_core::store::RemoteStore;
use trollbuddy_core::{Notifier, ShareLink, youtube};

use crate::session::{Session, find_sessions_by_field};

/// What a viewer needs to render a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub store_key: String,
    pub session_id: String,
    pub user_id: String,
    pub participant_name: String,
    /// Stored video, or the configured default when none was given.
    pub youtube_video_id: String,
}

impl SessionMetadata {
    pub fn embed_url(&self) -> String {
        youtube::embed_url(&self.youtube_video_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(SessionMetadata),
    /// No record yet. The creator's write may still be in flight.
    NotFound,
    /// The store could not be read.
    Unavailable,
}

impl Resolution {
    pub const fn metadata(&self) -> Option<&SessionMetadata> {
        match self {
            Self::Found(meta) => Some(meta),
            Self::NotFound | Self::Unavailable => None,
        }
    }
}

pub struct SessionViewer {
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    default_video_id: String,
}

impl SessionViewer {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            default_video_id: config.default_youtube_video_id.clone(),
        }
    }

    /// Look up the session named by a share link.
    ///
    /// Only the session id identifies the record; a differing user id is
    /// logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn resolve(&self, user_id: &str, session_id: &str) -> Resolution {
        let found =
            match find_sessions_by_field(self.store.as_ref(), "sessionId", session_id).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "Session lookup failed");
                    self.notifier.error("Could not load the session");
                    return Resolution::Unavailable;
                }
            };

        let Some(session) = pick(found, user_id) else {
            debug!("Session not found");
            return Resolution::NotFound;
        };
        if session.user_id() != user_id {
            info!(
                stored_user_id = %session.user_id(),
                "Share link user does not match the session owner"
            );
        }

        Resolution::Found(self.metadata(session))
    }

    pub async fn resolve_link(&self, link: &ShareLink) -> Resolution {
        self.resolve(&link.user_id, &link.session_id).await
    }

    /// Re-resolve while the session is not found, up to `attempts` times.
    ///
    /// Store failures end the retry immediately.
    pub async fn resolve_with_retry(
        &self,
        user_id: &str,
        session_id: &str,
        attempts: u32,
        delay: Duration,
    ) -> Resolution {
        let mut remaining = attempts.max(1);
        loop {
            let resolution = self.resolve(user_id, session_id).await;
            remaining -= 1;
            if resolution != Resolution::NotFound || remaining == 0 {
                return resolution;
            }
            debug!(remaining, "Session not found yet, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    fn metadata(&self, session: Session) -> SessionMetadata {
        let record = session.record;
        let youtube_video_id = record
            .youtube_video_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.default_video_id.clone());
        SessionMetadata {
            store_key: session.store_key,
            session_id: record.session_id,
            user_id: record.user_id,
            participant_name: record.name,
            youtube_video_id,
        }
    }
}

/// Prefer the record owned by the link's user when duplicates exist.
fn pick(found: Vec<Session>, user_id: &str) -> Option<Session> {
    let owned = found.iter().position(|s| s.user_id() == user_id);
    let mut found = found;
    match owned {
        Some(idx) => Some(found.swap_remove(idx)),
        None => found.into_iter().next(),
    }
}
