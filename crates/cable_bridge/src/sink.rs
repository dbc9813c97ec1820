//! External Broadcast Sinks
//!
//! An [`ExternalSink`] receives every broadcast forwarded by the bridge.
//! [`HttpSink`] talks to a broadcast server over HTTP; [`ChannelSink`] hands
//! broadcasts to another task in the same process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────────────
// Broadcast Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors reported by an external sink
#[derive(Debug, Clone, thiserror::Error)]
pub enum BroadcastError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Broadcast rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Sink closed")]
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// External Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Out-of-process broadcast service
#[async_trait]
pub trait ExternalSink: Send + Sync {
    async fn broadcast(&self, channel: &str, payload: &str) -> Result<(), BroadcastError>;
}

#[async_trait]
impl<S: ExternalSink + ?Sized> ExternalSink for Arc<S> {
    async fn broadcast(&self, channel: &str, payload: &str) -> Result<(), BroadcastError> {
        (**self).broadcast(channel, payload).await
    }
}

/// Body of a broadcast request: `{"stream": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct BroadcastRequest<'a> {
    pub stream: &'a str,
    pub data: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`HttpSink`]
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Broadcast endpoint (e.g., "http://localhost:8090/_broadcast")
    pub url: String,

    /// Optional bearer key sent as `Authorization: Bearer <key>`
    pub key: Option<String>,

    /// Request timeout enforced by the HTTP client
    pub request_timeout: Duration,
}

impl HttpSinkConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: None,
            request_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Sink that POSTs broadcasts to a broadcast server
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
    config: HttpSinkConfig,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, BroadcastError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl ExternalSink for HttpSink {
    async fn broadcast(&self, channel: &str, payload: &str) -> Result<(), BroadcastError> {
        let body = BroadcastRequest {
            stream: channel,
            data: payload,
        };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BroadcastError::Timeout(self.config.request_timeout)
            } else {
                BroadcastError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BroadcastError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("url", &self.config.url)
            .field("authenticated", &self.config.key.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel Sink
// ─────────────────────────────────────────────────────────────────────────────

/// A forwarded broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarded {
    pub channel: String,
    pub payload: String,
}

/// Sink handing broadcasts to an in-process receiver
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Forwarded>,
}

impl ChannelSink {
    /// Create a sink and the receiver it feeds
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Forwarded>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ExternalSink for ChannelSink {
    async fn broadcast(&self, channel: &str, payload: &str) -> Result<(), BroadcastError> {
        self.tx
            .send(Forwarded {
                channel: channel.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|_| BroadcastError::Closed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
