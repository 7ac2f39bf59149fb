//! HTTP client for the dentro row server.
//!
//! Endpoints:
//! - `GET /health`: reachability probe, no auth
//! - `GET /snapshot`: the account row (404 when absent)
//! - `PUT /snapshot`: upsert the account row

use std::time::Duration;

use reqwest::StatusCode;

use super::remote::{RemoteError, RemoteStore};
use crate::models::ClinicSnapshot;

/// Timeout for the reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Remote store backed by `dentro-server`.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    server_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    /// Creates a client. `api_key` is the account identity; `None` keeps the
    /// store in its unauthenticated no-op mode.
    pub fn new(server_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        // Accept ws(s) and bare hosts as well as http(s)
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replacen("ws://", "http://", 1)
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replacen("wss://", "https://", 1)
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> Result<String, RemoteError> {
        self.api_key
            .as_ref()
            .map(|key| format!("Bearer {}", key))
            .ok_or(RemoteError::Unauthenticated)
    }
}

fn status_error(status: StatusCode) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::Unauthorized(status.as_u16())
        }
        other => RemoteError::Status(other.as_u16()),
    }
}

impl RemoteStore for HttpRemoteStore {
    fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    async fn is_reachable(&self) -> bool {
        let url = self.build_http_url("/health");
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("health probe to {} failed: {}", url, e);
                false
            }
        }
    }

    async fn load(&self) -> Result<Option<ClinicSnapshot>, RemoteError> {
        if !self.is_authenticated() {
            return Ok(None);
        }

        let response = self
            .client
            .get(self.build_http_url("/snapshot"))
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        let snapshot = ClinicSnapshot::from_json_str(&body)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        tracing::debug!(
            last_updated = snapshot.last_updated,
            patients = snapshot.patients.len(),
            "pulled remote snapshot"
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &ClinicSnapshot) -> Result<(), RemoteError> {
        if !self.is_authenticated() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.build_http_url("/snapshot"))
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        Ok(())
    }
}
