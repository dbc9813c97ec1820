//! Entity references and portable tokens
//!
//! An [`EntityRef`] is an opaque handle to a persisted domain entity. A
//! [`PortableToken`] is the string form of that entity's identity, safe to
//! send across process boundaries.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::CodecError;

// ─────────────────────────────────────────────────────────────────────────────
// Entity
// ─────────────────────────────────────────────────────────────────────────────

/// A persisted domain entity that can be referenced from a [`Value`](crate::Value)
pub trait Entity: fmt::Debug + Send + Sync + 'static {
    /// Type tag used as the first token segment (e.g., "User", "Chat::Room")
    fn type_tag(&self) -> &str;

    /// Stable identifier within the type tag
    fn entity_id(&self) -> String;

    /// Access the concrete entity for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an [`Entity`]
///
/// Equality is referential: two refs are equal when they point at the same
/// stored entity (same type tag and id), even if they are distinct objects.
#[derive(Clone)]
pub struct EntityRef(Arc<dyn Entity>);

impl EntityRef {
    /// Wrap an entity
    pub fn new<E: Entity>(entity: E) -> Self {
        Self(Arc::new(entity))
    }

    pub fn type_tag(&self) -> &str {
        self.0.type_tag()
    }

    pub fn entity_id(&self) -> String {
        self.0.entity_id()
    }

    /// Downcast to the concrete entity type
    pub fn downcast_ref<E: Entity>(&self) -> Option<&E> {
        self.0.as_any().downcast_ref::<E>()
    }

    /// Default token for this entity (`<type_tag>/<entity_id>`)
    pub fn token(&self) -> PortableToken {
        PortableToken::new(self.type_tag(), self.entity_id())
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_tag() == other.type_tag() && self.entity_id() == other.entity_id()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.0).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Portable Token
// ─────────────────────────────────────────────────────────────────────────────

/// Portable identity of an entity, rendered as `<TypeTag>/<entity-id>`
///
/// The type tag must start with an ASCII uppercase letter and may contain
/// ASCII alphanumerics, `_` and `:`. The id must be non-empty and contain no
/// `/` or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortableToken {
    type_tag: String,
    entity_id: String,
}

impl PortableToken {
    /// Create a token without validating its parts
    pub fn new(type_tag: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Parse a string that has the token shape, `None` otherwise
    pub fn parse(raw: &str) -> Option<Self> {
        let (type_tag, entity_id) = raw.split_once('/')?;

        if !Self::is_valid_tag(type_tag) || !Self::is_valid_id(entity_id) {
            return None;
        }

        Some(Self::new(type_tag, entity_id))
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn is_valid_tag(tag: &str) -> bool {
        let mut chars = tag.chars();
        match chars.next() {
            Some(first) if first.is_ascii_uppercase() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
    }

    fn is_valid_id(id: &str) -> bool {
        !id.is_empty() && !id.chars().any(|c| c == '/' || c.is_whitespace())
    }
}

impl fmt::Display for PortableToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_tag, self.entity_id)
    }
}

impl FromStr for PortableToken {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CodecError::InvalidToken(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
