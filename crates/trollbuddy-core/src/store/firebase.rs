//! Firebase Realtime Database backend (REST API).
//!
//! Every path maps to `<database_url>/<path>.json`. `GET` reads, `PUT`
//! replaces, `POST` appends under a server-generated key (returned as
//! `{"name": "<key>"}`) and `DELETE` removes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{RemoteStore, StoreError, tree};

/// Connection settings for a Firebase Realtime Database.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Database URL (e.g., "<https://my-app-default-rtdb.firebaseio.com>").
    pub database_url: String,
    /// Optional ID token or database secret passed as `auth`.
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// REST client for a Firebase Realtime Database.
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    http: reqwest::Client,
    database_url: String,
    auth_token: Option<String>,
}

impl FirebaseStore {
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        if config.database_url.is_empty() {
            return Err(StoreError::Unavailable("database_url is empty".into()));
        }

        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            database_url: config.database_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Build the REST URL for a store path.
    pub(crate) fn url(&self, path: &str) -> Result<String, StoreError> {
        let segments = tree::split(path)?;
        let mut url = format!("{}/{}.json", self.database_url, tree::join(&segments));
        if let Some(token) = &self.auth_token {
            use std::fmt::Write;
            let _ = write!(url, "?auth={token}");
        }
        Ok(url)
    }

    /// Check HTTP response status, returning error for non-success codes.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let resp = self.http.get(self.url(path)?).send().await?;
        let value: Value = Self::check_status(resp).await?.json().await?;
        Ok(tree::normalize(value))
    }

    #[instrument(skip(self, record))]
    async fn push(&self, path: &str, record: Value) -> Result<String, StoreError> {
        let resp = self.http.post(self.url(path)?).json(&record).send().await?;
        let body: PushResponse = Self::check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Response(e.to_string()))?;
        debug!(key = %body.name, "Pushed record");
        Ok(body.name)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let resp = self.http.put(self.url(path)?).json(&value).send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let resp = self.http.delete(self.url(path)?).send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> FirebaseConfig {
        FirebaseConfig {
            database_url: "https://demo-default-rtdb.firebaseio.com/".to_string(),
            auth_token: token.map(str::to_string),
        }
    }

    #[test]
    fn rejects_empty_database_url() {
        let cfg = FirebaseConfig {
            database_url: String::new(),
            auth_token: None,
        };
        assert!(FirebaseStore::new(&cfg).is_err());
    }

    #[test]
    fn url_without_auth() {
        let store = FirebaseStore::new(&config(None)).unwrap();
        assert_eq!(
            store.url("/sessions/k1/").unwrap(),
            "https://demo-default-rtdb.firebaseio.com/sessions/k1.json"
        );
    }

    #[test]
    fn url_with_auth() {
        let store = FirebaseStore::new(&config(Some("secret"))).unwrap();
        assert_eq!(
            store.url("capturedImages/s1").unwrap(),
            "https://demo-default-rtdb.firebaseio.com/capturedImages/s1.json?auth=secret"
        );
    }

    #[test]
    fn empty_token_is_ignored() {
        let store = FirebaseStore::new(&config(Some(""))).unwrap();
        assert!(!store.url("a").unwrap().contains("auth="));
    }

    #[test]
    fn url_rejects_invalid_path() {
        let store = FirebaseStore::new(&config(None)).unwrap();
        assert!(store.url("a/b.c").is_err());
    }
}
