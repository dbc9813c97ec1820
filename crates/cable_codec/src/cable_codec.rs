//! Cable Codec - Value serialization for the broadcast bridge
//!
//! This crate contains the value model that crosses the boundary between an
//! application's local pub/sub and an external broadcast server, plus the
//! codec that turns entity references into portable tokens and back.
//!
//! ## Layers
//!
//! - [`Value`] - primitives, maps, arrays and entity references
//! - [`IdentityResolver`] - entity <-> [`PortableToken`] capabilities
//! - [`ValueCodec`] - serialize/deserialize, optionally as JSON text

mod codec;
mod entity;
mod resolver;
mod value;

pub use codec::*;
pub use entity::*;
pub use resolver::*;
pub use value::*;
