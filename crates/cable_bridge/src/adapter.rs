//! Subscription Adapter
//!
//! The capability every local broadcast adapter exposes, plus the
//! channel -> callback registry adapters are built on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// Callback
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber callback, invoked with each message broadcast on its channel
///
/// Callbacks are compared by pointer, so keep the `Arc` returned from
/// [`callback`] around to unsubscribe later.
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Wrap a closure as a [`Callback`]
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&str) + Send + Sync + 'static,
{
    Arc::new(f)
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Local publish/subscribe capability
#[async_trait]
pub trait SubscriptionAdapter: Send + Sync {
    /// Register a callback for a channel
    fn subscribe(&self, channel: &str, callback: Callback);

    /// Remove a previously registered callback
    fn unsubscribe(&self, channel: &str, callback: &Callback);

    /// Deliver a message to the channel's subscribers
    fn broadcast(&self, channel: &str, message: &str);

    /// Release resources; subscribers are kept
    fn shutdown(&self) {}

    /// Whether this adapter already forwards to an external sink
    fn is_bridged(&self) -> bool {
        false
    }

    /// Wait until any deferred work queued by earlier broadcasts has run
    async fn flush(&self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriber Map
// ─────────────────────────────────────────────────────────────────────────────

/// Channel name -> ordered list of callbacks
#[derive(Default)]
pub struct SubscriberMap {
    subscribers: RwLock<HashMap<String, Vec<Callback>>>,
}

impl SubscriberMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, returns true if it is the channel's first
    pub fn add_subscriber(&self, channel: &str, callback: Callback) -> bool {
        let mut subscribers = self.subscribers.write();
        let list = subscribers.entry(channel.to_string()).or_default();
        list.push(callback);
        list.len() == 1
    }

    /// Remove a subscriber, returns true if the channel has none left
    pub fn remove_subscriber(&self, channel: &str, callback: &Callback) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(channel) else {
            return false;
        };

        let before = list.len();
        list.retain(|existing| !Arc::ptr_eq(existing, callback));
        if list.len() == before {
            return false;
        }

        if list.is_empty() {
            subscribers.remove(channel);
            return true;
        }
        false
    }

    /// Invoke every callback on the channel in subscription order
    ///
    /// Returns the number of callbacks invoked.
    pub fn broadcast(&self, channel: &str, message: &str) -> usize {
        // Snapshot so callbacks can subscribe/unsubscribe without deadlocking
        let snapshot = match self.subscribers.read().get(channel) {
            Some(list) => list.clone(),
            None => return 0,
        };

        for callback in &snapshot {
            callback(message);
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers.read().get(channel).map_or(0, Vec::len)
    }

    pub fn channels(&self) -> Vec<String> {
        self.subscribers.read().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl std::fmt::Debug for SubscriberMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<String, usize> = self
            .subscribers
            .read()
            .iter()
            .map(|(channel, list)| (channel.clone(), list.len()))
            .collect();
        f.debug_struct("SubscriberMap")
            .field("subscribers", &counts)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
