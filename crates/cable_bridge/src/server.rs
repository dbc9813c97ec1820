//! Cable Server
//!
//! Value-level facade over an adapter: outgoing values are encoded to JSON
//! text through a [`ValueCodec`], incoming text is decoded back into values
//! (resolving entity tokens) before reaching value subscribers.

use std::sync::Arc;

use cable_codec::{CodecResult, Value, ValueCodec};
use tracing::warn;

use crate::{Callback, SubscriptionAdapter, callback};

/// Broadcasts and receives [`Value`]s over a [`SubscriptionAdapter`]
#[derive(Clone)]
pub struct CableServer {
    adapter: Arc<dyn SubscriptionAdapter>,
    codec: ValueCodec,
}

impl CableServer {
    pub fn new(adapter: Arc<dyn SubscriptionAdapter>, codec: ValueCodec) -> Self {
        Self { adapter, codec }
    }

    pub fn adapter(&self) -> &Arc<dyn SubscriptionAdapter> {
        &self.adapter
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Encode a value and broadcast it on a channel
    pub fn broadcast(&self, channel: &str, value: &Value) {
        let payload = self.codec.encode(value);
        self.adapter.broadcast(channel, &payload);
    }

    /// Subscribe with a callback receiving decoded values
    ///
    /// Payloads that fail to decode are logged and skipped. Returns the raw
    /// callback so it can be passed to [`SubscriptionAdapter::unsubscribe`].
    pub fn subscribe_values<F>(&self, channel: &str, on_value: F) -> Callback
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let codec = self.codec.clone();
        let channel_name = channel.to_string();
        let cb = callback(move |payload| match codec.decode(payload) {
            Ok(value) => on_value(value),
            Err(e) => {
                warn!(channel = %channel_name, error = %e, "Dropping undecodable payload");
            }
        });

        self.adapter.subscribe(channel, Arc::clone(&cb));
        cb
    }

    /// Decode a payload received from the external side
    pub fn decode(&self, payload: &str) -> CodecResult<Value> {
        self.codec.decode(payload)
    }
}

impl std::fmt::Debug for CableServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CableServer")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
