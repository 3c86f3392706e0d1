#![doc = "HTTP session for CLI and core: implements the core `Session` contract against the remote service's HTTP API."]
//
//! # HTTP Session (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the remote call abstraction in
//! [`putlink_core::contract`]. It wires up the `Session` trait for real use against the remote
//! file-hosting API and is what the CLI hands to [`putlink_core::client::Putio`].
//!
//! ## Wire shape
//! - Every call is `POST {base_url}/{resource}?method={operation}` with a single form field
//!   `request`, a JSON document holding the API key, secret, access token and call params.
//! - Every answer is an envelope `{"error", "error_message", "response": {"results": ...}}`.
//!   Errors, non-2xx statuses and unreadable bodies all surface as [`RemoteFault`]s carrying the
//!   resource, operation and params of the call.
//!
//! ## Token refresh
//! - After each successful `analyze` or `list` call the session spawns a `user/acctoken` call and
//!   stores the returned token. Nothing waits for it and it is not ordered against other calls
//!   in flight, so a concurrent call may still go out with the previous token.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use putlink_core::contract::{Params, Session};
use putlink_core::error::RemoteFault;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::load_config::CliConfig;

/// Operations after which the access token is refreshed in the background.
const REFRESHING_OPERATIONS: [&str; 2] = ["analyze", "list"];

#[derive(Clone)]
pub struct HttpSession {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    token: RwLock<Option<String>>,
}

impl HttpSession {
    pub fn from_config(config: &CliConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                e
            })?;
        tracing::info!(
            base_url = %config.api.base_url,
            timeout_secs = config.api.timeout_secs,
            api_key_set = !config.credentials.api_key.is_empty(),
            "Initialized HTTP session"
        );
        Ok(HttpSession {
            inner: Arc::new(Inner {
                client,
                base_url: config.api.base_url.trim_end_matches('/').to_string(),
                api_key: config.credentials.api_key.clone(),
                api_secret: config.credentials.api_secret.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    /// The most recently stored access token, if any.
    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_token(&self, token: String) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
    }

    fn spawn_refresh(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available, skipping background token refresh");
            return;
        };
        let session = self.clone();
        handle.spawn(async move {
            match session.refresh_token().await {
                Ok(_) => tracing::debug!("Access token refreshed in background"),
                Err(e) => tracing::warn!(error = %e, "Background token refresh failed"),
            }
        });
    }

    async fn call(
        &self,
        resource: &str,
        operation: &str,
        params: Params,
    ) -> Result<Vec<Value>, RemoteFault> {
        let url = format!("{}/{}", self.inner.base_url, resource);
        let mut request = json!({
            "api_key": self.inner.api_key,
            "api_secret": self.inner.api_secret,
            "params": &params,
        });
        if let Some(token) = self.token() {
            request["access_token"] = json!(token);
        }

        tracing::info!(url = %url, operation, "Invoking remote operation");
        let response = self
            .inner
            .client
            .post(&url)
            .query(&[("method", operation)])
            .form(&[("request", request.to_string())])
            .send()
            .await;

        let response = match response {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = ?e, url = %url, operation, "Transport error");
                return Err(RemoteFault::new(resource, operation, params, format!("transport error: {e}")));
            }
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = ?e, url = %url, operation, "Failed to read response body");
                return Err(RemoteFault::new(resource, operation, params, format!("unreadable body: {e}")));
            }
        };
        if !status.is_success() {
            tracing::error!(status = %status, url = %url, operation, "Service returned error status. Response body: {body}");
            return Err(RemoteFault::new(resource, operation, params, format!("HTTP {status}")));
        }
        decode_envelope(resource, operation, params, &body)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    response: Option<EnvelopeResponse>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    #[serde(default)]
    results: Value,
}

/// Unwrap a response envelope into its result records.
pub fn decode_envelope(
    resource: &str,
    operation: &str,
    params: Params,
    body: &str,
) -> Result<Vec<Value>, RemoteFault> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = ?e, resource, operation, "Failed to parse response envelope");
            return Err(RemoteFault::new(resource, operation, params, format!("malformed envelope: {e}")));
        }
    };
    if envelope.error {
        let message = envelope
            .error_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "service reported an error".to_string());
        tracing::error!(resource, operation, message = %message, "Service reported an error");
        return Err(RemoteFault::new(resource, operation, params, message));
    }
    let records = match envelope.response.map(|r| r.results) {
        Some(Value::Array(records)) => records,
        Some(Value::Null) | None => Vec::new(),
        Some(record) => vec![record],
    };
    tracing::debug!(resource, operation, records = records.len(), "Decoded response envelope");
    Ok(records)
}

#[async_trait]
impl Session for HttpSession {
    async fn invoke(
        &self,
        resource: &str,
        operation: &str,
        params: Params,
    ) -> Result<Vec<Value>, RemoteFault> {
        let records = self.call(resource, operation, params).await?;
        if REFRESHING_OPERATIONS.contains(&operation) {
            self.spawn_refresh();
        }
        Ok(records)
    }

    async fn refresh_token(&self) -> Result<String, RemoteFault> {
        let (resource, operation) = ("user", "acctoken");
        let records = self.call(resource, operation, Params::new()).await?;
        let token = records
            .first()
            .and_then(|r| r.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::error!("Token refresh response carried no token");
                RemoteFault::new(resource, operation, Params::new(), "response carried no token")
            })?;
        self.store_token(token.clone());
        tracing::info!("Access token refreshed");
        Ok(token)
    }
}
