//! Shared wiring for every subcommand: configuration, store and the
//! notification channel.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use trollbuddy_core::config::{self, Config};
use trollbuddy_core::store::{self, RemoteStore};
use trollbuddy_core::{NotificationKind, NotificationService, NotificationState, Notifier};

/// Notification channel that also echoes each message on stderr.
pub struct ConsoleNotifier {
    service: NotificationService,
}

impl ConsoleNotifier {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            service: NotificationService::new(dismiss_after),
        }
    }

    pub const fn service(&self) -> &NotificationService {
        &self.service
    }
}

impl Notifier for ConsoleNotifier {
    fn emit(&self, message: &str, kind: NotificationKind) {
        let tag = match kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        let _ = writeln!(io::stderr(), "[{tag}] {message}");
        self.service.emit(message, kind);
    }

    fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.service.subscribe()
    }
}

/// Everything a subcommand needs.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn RemoteStore>,
    pub notifier: Arc<ConsoleNotifier>,
}

impl AppContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = store::open(&config.store).await?;
        let notifier = Arc::new(ConsoleNotifier::new(Duration::from_millis(
            config.notifications.dismiss_after_ms,
        )));
        Ok(Self {
            config,
            store,
            notifier,
        })
    }
}

/// Resolve configuration from an explicit file or the usual hierarchy.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let config = match explicit {
        Some(path) => config::load_config_from(path)?,
        None => {
            let cwd = std::env::current_dir().ok();
            config::load_config(cwd.as_deref())?
        }
    };
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use trollbuddy_core::config::StoreBackend;

    #[tokio::test]
    async fn console_notifier_updates_channel() {
        let notifier = ConsoleNotifier::new(Duration::ZERO);
        notifier.error("boom");
        let state = notifier.service().current();
        assert!(state.visible);
        assert_eq!(state.message, "boom");
        assert_eq!(state.kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn context_opens_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let db = dir.path().join("store.db");
        std::fs::write(
            &path,
            format!(
                r#"{{"store": {{"backend": "sqlite", "sqlite_path": "{}"}}}}"#,
                db.display()
            ),
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        let ctx = AppContext::new(config).await.unwrap();
        ctx.store.set("probe", "x".into()).await.unwrap();
        assert!(db.exists());
    }
}
