//! HTTP implementation of [`Collector`].

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_monitor::Heartbeat;

use crate::collector::{classify_response, Collector, HeartbeatPayload};
use crate::error::{DeliveryError, Result, TransportError};

/// Connection settings for the compliance collector.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Base URL of the collector API, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Bearer token of the authenticated session.
    pub token: String,
    /// Path of the heartbeat endpoint, relative to `base_url`.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl CollectorConfig {
    /// Creates a config with the default endpoint and a 10 s timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full heartbeat URL.
    pub fn heartbeat_url(&self) -> Result<Url> {
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut base = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("url cannot be a base".to_string()));
        }
        let path = format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        );
        base.set_path(&path);
        Ok(base)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: String::new(),
            endpoint: "/shift-monitoring/heartbeat".to_string(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Collector reached over HTTP with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    url: Url,
    token: String,
}

impl HttpCollector {
    /// Builds a client for the given collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, the token is empty, or
    /// the HTTP client cannot be constructed.
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(TransportError::MissingToken);
        }
        let url = config.heartbeat_url()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url,
            token: config.token.clone(),
        })
    }

    /// Endpoint heartbeats are posted to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

fn network_error(err: &reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Network(err.to_string())
    }
}

impl Collector for HttpCollector {
    async fn deliver(&self, heartbeat: &Heartbeat) -> std::result::Result<(), DeliveryError> {
        let payload = HeartbeatPayload::from(heartbeat);
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| network_error(&e))?;
        debug!(status, urgent = heartbeat.urgent, "collector responded");

        classify_response(status, &body)
    }
}
