//! Organizer-side session manager.
//!
//! Enforces "one active session per organizer" by looking up before
//! creating. The lookup and the insert are two independent store calls, so
//! two organizer clients racing each other can both create a record; the
//! duplicate is harmless and is swept up by [`SessionManager::end_session`].

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use trollbuddy_core::config::SessionConfig;
use trollbuddy_core::store::{RemoteStore, paths};
use trollbuddy_core::{Notifier, ShareLink, ids};

use super::find_sessions_by_field;
use super::types::{FormErrors, Session, SessionForm, SessionRecord};
use crate::capture::CapturedImage;
use crate::{MAX_RETAINED_IMAGES, gallery};

/// A session the organizer is attached to, with its share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session: Session,
    pub share_link: ShareLink,
}

/// Result of [`SessionManager::start_or_resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session record was written.
    Created(ActiveSession),
    /// The organizer already had a session; it was re-attached.
    Resumed(ActiveSession),
    /// The form did not validate; nothing was written.
    Invalid(FormErrors),
    /// The store rejected the write. An error notification was emitted.
    Failed,
}

impl StartOutcome {
    pub const fn active(&self) -> Option<&ActiveSession> {
        match self {
            Self::Created(active) | Self::Resumed(active) => Some(active),
            Self::Invalid(_) | Self::Failed => None,
        }
    }
}

struct ManagerState {
    /// Session id the next created session will carry.
    candidate_session_id: String,
    current: Option<Session>,
}

/// Creates, resumes and tears down the organizer's session.
pub struct SessionManager {
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    config: SessionConfig,
    /// Signed-in organizer, if any.
    account: Option<String>,
    state: Mutex<ManagerState>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
        account: Option<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            account: account.filter(|a| !a.is_empty()),
            state: Mutex::new(ManagerState {
                candidate_session_id: ids::new_session_id(),
                current: None,
            }),
        }
    }

    /// User id written into records and links: the signed-in account or the
    /// configured "unknown" sentinel.
    pub fn user_id(&self) -> &str {
        self.account
            .as_deref()
            .unwrap_or(&self.config.unknown_user_id)
    }

    /// Session id the next created session will use.
    pub async fn candidate_session_id(&self) -> String {
        self.state.lock().await.candidate_session_id.clone()
    }

    /// The session this manager is currently attached to.
    pub async fn current(&self) -> Option<ActiveSession> {
        let state = self.state.lock().await;
        state.current.clone().map(|session| self.activate(session))
    }

    fn activate(&self, session: Session) -> ActiveSession {
        let share_link = ShareLink::new(
            &self.config.base_url,
            session.user_id(),
            session.session_id(),
        );
        ActiveSession {
            session,
            share_link,
        }
    }

    /// Look up the signed-in organizer's session on record.
    ///
    /// Anonymous organizers share the sentinel user id, so they never match
    /// each other's sessions. Store failures are logged and treated as "no
    /// session".
    async fn lookup_own_session(&self) -> Option<Session> {
        let account = self.account.as_deref()?;
        match find_sessions_by_field(self.store.as_ref(), "userId", account).await {
            Ok(mut found) => {
                if found.len() > 1 {
                    warn!(
                        user_id = %account,
                        count = found.len(),
                        "Organizer has more than one session on record"
                    );
                }
                // Children come back ordered by push key, i.e. oldest first.
                (!found.is_empty()).then(|| found.remove(0))
            }
            Err(e) => {
                warn!(user_id = %account, error = %e, "Session lookup failed");
                None
            }
        }
    }

    /// Re-attach to the organizer's existing session without submitting a
    /// form (e.g. when the organizer view is reopened).
    #[instrument(skip(self), fields(user_id = %self.user_id()))]
    pub async fn resume_existing(&self) -> Option<ActiveSession> {
        let mut state = self.state.lock().await;
        if let Some(current) = &state.current {
            return Some(self.activate(current.clone()));
        }

        let session = self.lookup_own_session().await?;
        info!(
            session_id = %session.session_id(),
            store_key = %session.store_key,
            "Resumed existing session"
        );
        state.current = Some(session.clone());
        Some(self.activate(session))
    }

    /// Validate the form, then resume the organizer's session if one exists
    /// or create a new one.
    ///
    /// Never fails: validation problems come back as
    /// [`StartOutcome::Invalid`] and store failures as
    /// [`StartOutcome::Failed`] plus an error notification.
    #[instrument(skip(self, form), fields(user_id = %self.user_id()))]
    pub async fn start_or_resume(&self, form: &SessionForm) -> StartOutcome {
        let valid = match form.validate() {
            Ok(valid) => valid,
            Err(errors) => {
                info!(errors = %errors, "Session form rejected");
                return StartOutcome::Invalid(errors);
            }
        };

        let mut state = self.state.lock().await;

        if let Some(current) = &state.current {
            return StartOutcome::Resumed(self.activate(current.clone()));
        }
        if let Some(existing) = self.lookup_own_session().await {
            info!(
                session_id = %existing.session_id(),
                "Organizer already has a session; resuming"
            );
            state.current = Some(existing.clone());
            return StartOutcome::Resumed(self.activate(existing));
        }

        let record = SessionRecord {
            session_id: state.candidate_session_id.clone(),
            user_id: self.user_id().to_string(),
            name: valid.name,
            age: valid.age,
            youtube_video_id: Some(
                valid
                    .youtube_video_id
                    .unwrap_or_else(|| self.config.default_youtube_video_id.clone()),
            ),
        };

        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to encode session record");
                self.notifier.error("Could not create the session QR code");
                return StartOutcome::Failed;
            }
        };

        match self.store.push(paths::SESSIONS, value).await {
            Ok(store_key) => {
                info!(
                    session_id = %record.session_id,
                    store_key = %store_key,
                    "Session created"
                );
                let session = Session { store_key, record };
                state.current = Some(session.clone());
                self.notifier.success("Session QR code created");
                StartOutcome::Created(self.activate(session))
            }
            Err(e) => {
                warn!(error = %e, "Failed to create session");
                self.notifier.error("Could not create the session QR code");
                StartOutcome::Failed
            }
        }
    }

    /// Delete the organizer's session and its images, then reset local state
    /// with a fresh candidate session id.
    ///
    /// Besides the attached session, every other record of the signed-in
    /// organizer is deleted too, which removes duplicates left by concurrent
    /// creation. Returns `false` if any session record could not be deleted;
    /// local state is reset either way.
    #[instrument(skip(self), fields(user_id = %self.user_id()))]
    pub async fn end_session(&self) -> bool {
        let mut state = self.state.lock().await;

        let mut targets: Vec<Session> = state.current.take().into_iter().collect();
        if let Some(account) = self.account.as_deref() {
            match find_sessions_by_field(self.store.as_ref(), "userId", account).await {
                Ok(found) => {
                    for session in found {
                        if !targets.iter().any(|t| t.store_key == session.store_key) {
                            targets.push(session);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Session lookup before delete failed"),
            }
        }

        let mut all_deleted = true;
        for session in &targets {
            if let Err(e) = self
                .store
                .remove(&paths::session_record(&session.store_key))
                .await
            {
                warn!(
                    store_key = %session.store_key,
                    error = %e,
                    "Failed to delete session record"
                );
                all_deleted = false;
                continue;
            }
            if let Err(e) = self
                .store
                .remove(&paths::captured_images(session.session_id()))
                .await
            {
                warn!(
                    session_id = %session.session_id(),
                    error = %e,
                    "Failed to delete captured images"
                );
            }
            info!(session_id = %session.session_id(), "Session deleted");
        }

        if !targets.is_empty() {
            if all_deleted {
                self.notifier.success("Session ended");
            } else {
                self.notifier.error("Could not delete the session");
            }
        }

        state.candidate_session_id = ids::new_session_id();
        all_deleted
    }

    /// Latest images of the attached session, most recent first. Empty when
    /// no session is attached or the store cannot be read.
    pub async fn captured_images(&self) -> Vec<CapturedImage> {
        let session_id = {
            let state = self.state.lock().await;
            match &state.current {
                Some(session) => session.session_id().to_string(),
                None => return Vec::new(),
            }
        };

        match gallery::latest_images(self.store.as_ref(), &session_id, MAX_RETAINED_IMAGES).await {
            Ok(images) => images,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load captured images");
                Vec::new()
            }
        }
    }
}
