//! Identity resolution for entity references
//!
//! The codec never knows how entities are stored. Hosts inject an
//! [`IdentityResolver`] that maps entities to tokens and back. The
//! [`LocatorRegistry`] is a ready-made resolver built from one locator per
//! entity type.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{EntityRef, PortableToken};

// ─────────────────────────────────────────────────────────────────────────────
// Identity Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Capabilities the host provides to turn entities into tokens and back
pub trait IdentityResolver: Send + Sync {
    /// Portable token for an entity
    fn token_of(&self, entity: &EntityRef) -> PortableToken {
        entity.token()
    }

    /// Resolve a token to the entity it names, `None` if it no longer exists
    fn lookup(&self, token: &PortableToken) -> Option<EntityRef>;

    /// Whether tokens with this type tag name entities this resolver owns
    fn handles_type(&self, type_tag: &str) -> bool;

    /// Decide whether a raw string is a token this resolver is responsible for
    ///
    /// Strings that are not recognized are never looked up and pass through
    /// the codec as plain strings. By default a string must have the token
    /// shape and a type tag accepted by [`handles_type`](Self::handles_type).
    fn recognize(&self, raw: &str) -> Option<PortableToken> {
        PortableToken::parse(raw).filter(|token| self.handles_type(token.type_tag()))
    }
}

impl<R: IdentityResolver + ?Sized> IdentityResolver for Arc<R> {
    fn token_of(&self, entity: &EntityRef) -> PortableToken {
        (**self).token_of(entity)
    }

    fn lookup(&self, token: &PortableToken) -> Option<EntityRef> {
        (**self).lookup(token)
    }

    fn handles_type(&self, type_tag: &str) -> bool {
        (**self).handles_type(type_tag)
    }

    fn recognize(&self, raw: &str) -> Option<PortableToken> {
        (**self).recognize(raw)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Locators
// ─────────────────────────────────────────────────────────────────────────────

/// Finds entities of a single type by id
pub trait Locator: Send + Sync {
    fn locate(&self, entity_id: &str) -> Option<EntityRef>;
}

impl<F> Locator for F
where
    F: Fn(&str) -> Option<EntityRef> + Send + Sync,
{
    fn locate(&self, entity_id: &str) -> Option<EntityRef> {
        self(entity_id)
    }
}

/// Resolver dispatching lookups to a locator registered per type tag
///
/// Only tokens whose type tag has a registered locator are recognized, so a
/// payload like `"Status/ok"` stays a string unless a `Status` locator exists.
#[derive(Default)]
pub struct LocatorRegistry {
    locators: DashMap<String, Arc<dyn Locator>>,
}

impl LocatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a locator for a type tag, replacing any previous one
    pub fn register(&self, type_tag: impl Into<String>, locator: impl Locator + 'static) {
        let type_tag = type_tag.into();
        tracing::debug!(type_tag = %type_tag, "Registered entity locator");
        self.locators.insert(type_tag, Arc::new(locator));
    }

    /// Remove the locator for a type tag
    pub fn unregister(&self, type_tag: &str) -> bool {
        self.locators.remove(type_tag).is_some()
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.locators.contains_key(type_tag)
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

impl IdentityResolver for LocatorRegistry {
    fn lookup(&self, token: &PortableToken) -> Option<EntityRef> {
        // Clone the locator out so the shard lock is not held during lookup
        let locator = self
            .locators
            .get(token.type_tag())
            .map(|entry| Arc::clone(entry.value()))?;
        locator.locate(token.entity_id())
    }

    fn handles_type(&self, type_tag: &str) -> bool {
        self.contains(type_tag)
    }
}

impl std::fmt::Debug for LocatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<String> = self.locators.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("LocatorRegistry").field("type_tags", &tags).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Entity;
    use std::any::Any;

    #[derive(Debug)]
    struct User {
        id: u64,
    }

    impl Entity for User {
        fn type_tag(&self) -> &str {
            "User"
        }

        fn entity_id(&self) -> String {
            self.id.to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> LocatorRegistry {
        let registry = LocatorRegistry::new();
        registry.register("User", |id: &str| {
            let id: u64 = id.parse().ok()?;
            (id < 100).then(|| EntityRef::new(User { id }))
        });
        registry
    }

    #[test]
    fn test_lookup_dispatches_by_type_tag() {
        let registry = registry();

        let found = registry.lookup(&PortableToken::new("User", "5")).unwrap();
        assert_eq!(found.downcast_ref::<User>().map(|u| u.id), Some(5));

        assert!(registry.lookup(&PortableToken::new("User", "500")).is_none());
        assert!(registry.lookup(&PortableToken::new("Post", "5")).is_none());
    }

    #[test]
    fn test_recognize_requires_registered_tag() {
        let registry = registry();

        assert_eq!(
            registry.recognize("User/5"),
            Some(PortableToken::new("User", "5"))
        );
        assert_eq!(registry.recognize("Status/ok"), None);
        assert_eq!(registry.recognize("not a token"), None);
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = registry();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("User"));

        assert!(registry.unregister("User"));
        assert!(!registry.unregister("User"));
        assert!(registry.is_empty());
        assert_eq!(registry.recognize("User/5"), None);
    }
}
