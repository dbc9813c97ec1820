//! Adapter Bridge
//!
//! [`BridgedAdapter`] decorates a [`SubscriptionAdapter`]: subscribe and
//! unsubscribe pass straight through, and every broadcast is delivered
//! locally first and then handed to a [`Forwarder`] for the external sink.
//! Sink failures never reach the broadcasting caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    Callback, ExternalSink, ForwardStats, Forwarder, ForwarderConfig, SubscriptionAdapter,
};

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while bridging an adapter
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("No tokio runtime available to run the forwarder")]
    NoRuntime,
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Bridged Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Bridge an adapter to an external sink
///
/// Bridging an adapter that is already bridged does not add a second
/// forwarder: the returned wrapper only passes calls through, and each
/// broadcast is still forwarded exactly once by the inner bridge.
///
/// Forwarding is fire-and-forget through a bounded queue. When the queue is
/// full (see [`ForwarderConfig::with_queue_capacity`]) the forward is dropped
/// and counted in [`ForwardStats::dropped`]; local delivery still happens.
pub fn extend_adapter(
    adapter: Arc<dyn SubscriptionAdapter>,
    sink: Arc<dyn ExternalSink>,
    config: ForwarderConfig,
) -> BridgeResult<Arc<BridgedAdapter>> {
    BridgedAdapter::new(adapter, sink, config).map(Arc::new)
}

/// Adapter that also forwards broadcasts to an external sink
pub struct BridgedAdapter {
    inner: Arc<dyn SubscriptionAdapter>,
    forwarder: Option<Forwarder>,
}

impl BridgedAdapter {
    pub fn new(
        adapter: Arc<dyn SubscriptionAdapter>,
        sink: Arc<dyn ExternalSink>,
        config: ForwarderConfig,
    ) -> BridgeResult<Self> {
        if adapter.is_bridged() {
            debug!("Adapter already bridged, forwarding left to the existing bridge");
            return Ok(Self {
                inner: adapter,
                forwarder: None,
            });
        }

        let forwarder = Forwarder::spawn(sink, config)?;
        info!("Adapter bridged to external broadcast sink");

        Ok(Self {
            inner: adapter,
            forwarder: Some(forwarder),
        })
    }

    /// The wrapped adapter
    pub fn inner(&self) -> &Arc<dyn SubscriptionAdapter> {
        &self.inner
    }

    /// Whether this wrapper owns the forwarder (false for a re-bridge)
    pub fn is_forwarding(&self) -> bool {
        self.forwarder.is_some()
    }

    /// Forwarding counters, `None` for a re-bridge wrapper
    pub fn stats(&self) -> Option<ForwardStats> {
        self.forwarder.as_ref().map(Forwarder::stats)
    }
}

#[async_trait]
impl SubscriptionAdapter for BridgedAdapter {
    fn subscribe(&self, channel: &str, callback: Callback) {
        self.inner.subscribe(channel, callback);
    }

    fn unsubscribe(&self, channel: &str, callback: &Callback) {
        self.inner.unsubscribe(channel, callback);
    }

    fn broadcast(&self, channel: &str, message: &str) {
        self.inner.broadcast(channel, message);

        if let Some(forwarder) = &self.forwarder {
            forwarder.forward(channel, message);
        }
    }

    fn shutdown(&self) {
        if let Some(forwarder) = &self.forwarder {
            forwarder.close();
        }
        self.inner.shutdown();
    }

    fn is_bridged(&self) -> bool {
        true
    }

    async fn flush(&self) {
        if let Some(forwarder) = &self.forwarder {
            forwarder.flush().await;
        }
        self.inner.flush().await;
    }
}

impl std::fmt::Debug for BridgedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgedAdapter")
            .field("forwarder", &self.forwarder)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
