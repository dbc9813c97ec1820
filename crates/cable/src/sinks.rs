//! Local sinks
//!
//! [`WriterSink`] writes each forwarded broadcast as one JSON line, using the
//! same `{"stream": ..., "data": ...}` body the HTTP sink posts.

use async_trait::async_trait;
use cable_bridge::{BroadcastError, BroadcastRequest, ExternalSink};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Sink writing JSON lines to an async writer
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

/// Writer sink over stdout
pub type StdoutSink = WriterSink<Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> ExternalSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn broadcast(&self, channel: &str, payload: &str) -> Result<(), BroadcastError> {
        let body = BroadcastRequest {
            stream: channel,
            data: payload,
        };
        let mut line =
            serde_json::to_vec(&body).map_err(|e| BroadcastError::Transport(e.to_string()))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
