//! Inline Adapter
//!
//! In-process adapter delivering broadcasts synchronously on the caller's
//! thread.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::{Callback, SubscriberMap, SubscriptionAdapter};

/// Synchronous in-process subscription adapter
#[derive(Debug, Default)]
pub struct InlineAdapter {
    subscribers: SubscriberMap,
    messages_broadcast: AtomicU64,
    deliveries: AtomicU64,
}

impl InlineAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribers(&self) -> &SubscriberMap {
        &self.subscribers
    }

    pub fn stats(&self) -> AdapterStats {
        AdapterStats {
            messages_broadcast: self.messages_broadcast.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            channels: self.subscribers.channels().len(),
        }
    }
}

impl SubscriptionAdapter for InlineAdapter {
    fn subscribe(&self, channel: &str, callback: Callback) {
        if self.subscribers.add_subscriber(channel, callback) {
            debug!(channel = %channel, "Channel opened");
        }
    }

    fn unsubscribe(&self, channel: &str, callback: &Callback) {
        if self.subscribers.remove_subscriber(channel, callback) {
            debug!(channel = %channel, "Channel closed");
        }
    }

    fn broadcast(&self, channel: &str, message: &str) {
        let delivered = self.subscribers.broadcast(channel, message);

        self.messages_broadcast.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);

        trace!(channel = %channel, delivered, "Broadcast delivered locally");
    }
}

/// Counters for an [`InlineAdapter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterStats {
    pub messages_broadcast: u64,
    pub deliveries: u64,
    pub channels: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
