//! Sinks used by the unit tests

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{BroadcastError, ExternalSink, Forwarded};

/// Records every call
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Forwarded>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<Forwarded> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ExternalSink for RecordingSink {
    async fn broadcast(&self, channel: &str, payload: &str) -> Result<(), BroadcastError> {
        self.calls.lock().push(Forwarded {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

/// Always fails
#[derive(Debug)]
pub struct FailingSink;

#[async_trait]
impl ExternalSink for FailingSink {
    async fn broadcast(&self, _channel: &str, _payload: &str) -> Result<(), BroadcastError> {
        Err(BroadcastError::Transport("connection refused".into()))
    }
}

/// Sleeps before succeeding
#[derive(Debug)]
pub struct SlowSink(pub Duration);

#[async_trait]
impl ExternalSink for SlowSink {
    async fn broadcast(&self, _channel: &str, _payload: &str) -> Result<(), BroadcastError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
