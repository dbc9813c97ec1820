//! Broadcast relay
//!
//! Reads newline-delimited broadcast requests and broadcasts each one through
//! an adapter. A request looks like the HTTP broadcast body:
//! `{"stream": "room:1", "data": "hello"}`. String data is broadcast
//! verbatim; any other JSON value is broadcast as JSON text.

use cable_bridge::SubscriptionAdapter;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Error type for relay input
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid broadcast request: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    #[error("Broadcast request has an empty stream")]
    EmptyStream,
}

/// One line of relay input
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelayRequest {
    pub stream: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RelayRequest {
    /// Parse a line, `None` for blank lines
    pub fn parse(line: &str) -> Result<Option<Self>, RelayError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let request: RelayRequest = serde_json::from_str(line)?;
        if request.stream.is_empty() {
            return Err(RelayError::EmptyStream);
        }
        Ok(Some(request))
    }

    /// Message text handed to the adapter
    pub fn payload(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Relay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub relayed: u64,
    pub skipped: u64,
}

/// Relay every request from `reader` until end of input
pub async fn run<R>(reader: R, adapter: &dyn SubscriptionAdapter) -> std::io::Result<RelayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = RelayStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        match RelayRequest::parse(&line) {
            Ok(Some(request)) => {
                adapter.broadcast(&request.stream, &request.payload());
                stats.relayed += 1;
                debug!(stream = %request.stream, "Relayed broadcast");
            }
            Ok(None) => {}
            Err(e) => {
                stats.skipped += 1;
                warn!(error = %e, "Skipping relay input line");
            }
        }
    }

    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
