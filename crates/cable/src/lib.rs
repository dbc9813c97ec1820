//! Cable - Broadcast bridge operator tool
//!
//! This crate wires the codec and bridge crates into a small command line
//! tool, including:
//! - Configuration loading (`cable.toml`)
//! - Logging setup
//! - A writer sink for running without a broadcast server
//! - A stdin relay forwarding broadcast requests line by line

// Re-export core crates
pub use cable_bridge;
pub use cable_codec;

// Configuration
pub mod config;

// Tracing subscriber setup
pub mod logging;

// Broadcast relay
pub mod relay;

// Local sinks
pub mod sinks;
