//! Safe-search moderation of captured frames.
//!
//! Moderation never blocks the pipeline on its own failures: without an API
//! key, or when the annotation request fails, the frame is allowed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use trollbuddy_core::config::ModerationConfig;

/// Decides whether a captured frame may be kept.
#[async_trait]
pub trait ImageModerator: Send + Sync {
    async fn is_allowed(&self, data_url: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vision API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Likelihood buckets reported by the Vision API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    const fn is_probable(self) -> bool {
        matches!(self, Self::Likely | Self::VeryLikely)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SafeSearchAnnotation {
    pub adult: Likelihood,
    pub violence: Likelihood,
    pub racy: Likelihood,
}

impl SafeSearchAnnotation {
    /// Adult, violent or racy content rated likely or above is blocked.
    pub const fn is_blocked(&self) -> bool {
        self.adult.is_probable() || self.violence.is_probable() || self.racy.is_probable()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnnotateResponse {
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnnotateImageResponse {
    safe_search_annotation: Option<SafeSearchAnnotation>,
}

/// Google Cloud Vision `SAFE_SEARCH_DETECTION` moderator.
#[derive(Debug, Clone)]
pub struct VisionModerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl VisionModerator {
    pub fn new(config: &ModerationConfig) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch the safe-search annotation for one image.
    ///
    /// `Ok(None)` means the API answered without an annotation.
    #[instrument(skip(self, data_url))]
    pub async fn annotate(
        &self,
        api_key: &str,
        data_url: &str,
    ) -> Result<Option<SafeSearchAnnotation>, ModerationError> {
        let content = data_url.split_once(',').map_or(data_url, |(_, b64)| b64);
        let body = json!({
            "requests": [{
                "image": { "content": content },
                "features": [{ "type": "SAFE_SEARCH_DETECTION" }]
            }]
        });

        let url = format!("{}?key={api_key}", self.endpoint);
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnnotateResponse = resp.json().await?;
        Ok(parsed
            .responses
            .into_iter()
            .next()
            .and_then(|r| r.safe_search_annotation))
    }
}

#[async_trait]
impl ImageModerator for VisionModerator {
    async fn is_allowed(&self, data_url: &str) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            return true;
        };
        match self.annotate(api_key, data_url).await {
            Ok(Some(annotation)) => {
                debug!(?annotation, "Safe-search annotation");
                !annotation.is_blocked()
            }
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "Moderation request failed, allowing image");
                true
            }
        }
    }
}
