//! Configuration resolution for `TrollBuddy`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/trollbuddy/settings.json)
//! 3. Project config (.trollbuddy/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete `TrollBuddy` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which store backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
    Firebase,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "firebase" => Ok(Self::Firebase),
            other => Err(Error::Config(format!("Unknown store backend '{other}'"))),
        }
    }
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Firebase Realtime Database URL.
    pub database_url: Option<String>,
    /// Firebase ID token or database secret.
    pub auth_token: Option<String>,
    /// `SQLite` store file; defaults to [`default_store_path`].
    pub sqlite_path: Option<PathBuf>,
}

/// Session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL share links are built on.
    pub base_url: String,
    /// Video shown when the organizer leaves the `YouTube` field empty.
    pub default_youtube_video_id: String,
    /// User id recorded when no account is signed in.
    pub unknown_user_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4200".to_string(),
            default_youtube_video_id: "p3s19nI1NAI".to_string(),
            unknown_user_id: "unknown-user".to_string(),
        }
    }
}

/// Capture loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Milliseconds between two snapshots.
    pub interval_ms: u64,
    /// Video device used by the device-backed source.
    pub device: PathBuf,
    /// Snapshot command; `{device}` is replaced by the device path. The
    /// command must write one PNG image to stdout.
    pub command: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            device: PathBuf::from("/dev/video0"),
            command: [
                "ffmpeg",
                "-loglevel",
                "error",
                "-f",
                "v4l2",
                "-i",
                "{device}",
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "-",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// Image moderation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Google Vision API key. Moderation is skipped when unset.
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
        }
    }
}

/// Notification slot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub dismiss_after_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: 5000,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut layers = Vec::new();
    if let Some(global_path) = global_config_path() {
        layers.push(global_path);
    }
    if let Some(dir) = project_dir {
        layers.push(dir.join(".trollbuddy").join("settings.json"));
    }
    resolve_layers(layers.iter().map(PathBuf::as_path).filter(|p| p.exists()))
}

/// Load an explicit configuration file over the built-in defaults, then
/// apply environment overrides. Global and project files are not read.
pub fn load_config_from(path: &Path) -> Result<Config> {
    resolve_layers([path])
}

/// Merge each file over the defaults, lowest priority first. A layer only
/// overrides the keys it actually contains.
fn resolve_layers<'a>(layers: impl IntoIterator<Item = &'a Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;
    for path in layers {
        merge_layer(&mut merged, load_layer(path)?);
    }
    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn load_layer(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let layer: Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    if !layer.is_object() {
        return Err(Error::Config(format!(
            "Config file {} must contain a JSON object",
            path.display()
        )));
    }
    Ok(layer)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("trollbuddy").join("settings.json"))
}

/// Default location of the `SQLite` store.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("trollbuddy").join("store.db"))
}

fn merge_layer(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_layer(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.capture.interval_ms == 0 {
        return Err(Error::Config("capture.interval_ms must be at least 1".to_string()));
    }
    Ok(())
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("TROLLBUDDY_STORE")
        && let Ok(backend) = val.parse()
    {
        config.store.backend = backend;
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_DATABASE_URL") {
        config.store.database_url = Some(val);
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_AUTH_TOKEN") {
        config.store.auth_token = Some(val);
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_SQLITE_PATH") {
        config.store.sqlite_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_BASE_URL") {
        config.session.base_url = val;
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_CAPTURE_INTERVAL_MS")
        && let Ok(n) = val.parse()
    {
        config.capture.interval_ms = n;
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_VISION_API_KEY") {
        config.moderation.api_key = Some(val);
    }
    if let Ok(val) = std::env::var("TROLLBUDDY_LOG_LEVEL") {
        config.log_level = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_capture_interval_is_5s() {
        let config = Config::default();
        assert_eq!(config.capture.interval_ms, 5000);
    }

    #[test]
    fn default_video_is_configured() {
        let config = Config::default();
        assert_eq!(config.session.default_youtube_video_id, "p3s19nI1NAI");
        assert_eq!(config.session.unknown_user_id, "unknown-user");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"store": {"backend": "firebase"}, "capture": {"interval_ms": 250}}"#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Firebase);
        assert_eq!(config.capture.interval_ms, 250);
        assert_eq!(config.capture.device, PathBuf::from("/dev/video0"));
        assert_eq!(config.notifications.dismiss_after_ms, 5000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".trollbuddy");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("settings.json"),
            r#"{"session": {"base_url": "https://booth.example"}, "store": {"backend": "memory"}}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.session.base_url, "https://booth.example");
        assert_eq!(config.session.default_youtube_video_id, "p3s19nI1NAI");
    }

    #[test]
    fn explicit_file_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("booth.json");
        std::fs::write(&path, r#"{"capture": {"device": "/dev/video2"}}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.capture.device, PathBuf::from("/dev/video2"));
        assert_eq!(config.capture.interval_ms, 5000);
    }

    #[test]
    fn later_layer_keeps_unset_keys_of_earlier_layer() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        let project = dir.path().join("project.json");
        std::fs::write(
            &global,
            r#"{"store": {"backend": "firebase", "database_url": "https://booth.firebaseio.com"},
                "session": {"base_url": "https://booth.example"}}"#,
        )
        .unwrap();
        std::fs::write(&project, r#"{"log_level": "debug", "capture": {"interval_ms": 250}}"#)
            .unwrap();

        let config = resolve_layers([global.as_path(), project.as_path()]).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Firebase);
        assert_eq!(
            config.store.database_url.as_deref(),
            Some("https://booth.firebaseio.com")
        );
        assert_eq!(config.session.base_url, "https://booth.example");
        assert_eq!(config.session.unknown_user_id, "unknown-user");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.capture.interval_ms, 250);
        assert_eq!(config.capture.device, PathBuf::from("/dev/video0"));
    }

    #[test]
    fn later_layer_overrides_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        let project = dir.path().join("project.json");
        std::fs::write(&global, r#"{"store": {"backend": "firebase"}}"#).unwrap();
        std::fs::write(&project, r#"{"store": {"backend": "memory"}}"#).unwrap();

        let config = resolve_layers([global.as_path(), project.as_path()]).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn zero_capture_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"capture": {"interval_ms": 0}}"#).unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}
