//! Cable Bridge - Local pub/sub forwarding to an external broadcast server
//!
//! This crate wraps an in-process subscription adapter so that every local
//! broadcast is also forwarded to an external broadcast sink, without
//! changing how local subscribers receive messages.
//!
//! # Architecture
//!
//! - [`SubscriptionAdapter`] - the subscribe/unsubscribe/broadcast capability
//! - [`InlineAdapter`] - in-process adapter over a [`SubscriberMap`]
//! - [`ExternalSink`] - where forwarded broadcasts go ([`HttpSink`], [`ChannelSink`])
//! - [`Forwarder`] - background task draining forwards into a sink
//! - [`BridgedAdapter`] - decorator created by [`extend_adapter`]
//! - [`CableServer`] - value-level broadcast/subscribe through a [`ValueCodec`]
//!
//! [`ValueCodec`]: cable_codec::ValueCodec

pub use cable_codec;

mod adapter;
mod bridge;
mod forwarder;
mod inline;
mod server;
mod sink;

#[cfg(test)]
mod test_support;

pub use adapter::*;
pub use bridge::*;
pub use forwarder::*;
pub use inline::*;
pub use server::*;
pub use sink::*;
