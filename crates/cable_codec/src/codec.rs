//! Value Codec
//!
//! Converts [`Value`]s into a transport-safe form and back. Entity
//! references become [`PortableToken`] strings on the way out and are looked
//! up again on the way in; everything else passes through untouched.
//!
//! The codec is shallow by default: only the top-level value is inspected.
//! [`Depth::Deep`] opts into walking maps and arrays.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{EntityRef, IdentityResolver, PortableToken, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Codec Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while decoding values
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Entity not found for token: {0}")]
    NotFound(PortableToken),

    #[error("Invalid portable token: {0}")]
    InvalidToken(String),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

// ─────────────────────────────────────────────────────────────────────────────
// Codec Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Wire form requested from [`ValueCodec::serialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// In-memory value
    #[default]
    Native,
    /// UTF-8 JSON text
    Json,
}

/// How far into a value the codec looks for entities and tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    /// Only the top-level value
    #[default]
    Shallow,
    /// Maps and arrays are walked recursively
    Deep,
}

/// What to do with a recognized token whose entity cannot be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Fail with [`CodecError::NotFound`]
    #[default]
    Fail,
    /// Return the raw token string
    PassThrough,
}

/// Codec behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecConfig {
    pub depth: Depth,
    pub unresolved: UnresolvedPolicy,
}

impl CodecConfig {
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_unresolved(mut self, unresolved: UnresolvedPolicy) -> Self {
        self.unresolved = unresolved;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialized
// ─────────────────────────────────────────────────────────────────────────────

/// Output of [`ValueCodec::serialize`] and input of [`ValueCodec::deserialize`]
#[derive(Debug, Clone, PartialEq)]
pub enum Serialized {
    Native(Value),
    Text(String),
}

impl Serialized {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Serialized::Native(v) => Some(v),
            Serialized::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Serialized::Text(s) => Some(s),
            Serialized::Native(_) => None,
        }
    }
}

impl From<Value> for Serialized {
    fn from(v: Value) -> Self {
        Serialized::Native(v)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Serializes values for the broadcast boundary
#[derive(Clone)]
pub struct ValueCodec {
    resolver: Arc<dyn IdentityResolver>,
    config: CodecConfig,
}

impl ValueCodec {
    /// Create a shallow, fail-closed codec
    pub fn new(resolver: impl IdentityResolver + 'static) -> Self {
        Self::with_config(resolver, CodecConfig::default())
    }

    pub fn with_config(resolver: impl IdentityResolver + 'static, config: CodecConfig) -> Self {
        Self {
            resolver: Arc::new(resolver),
            config,
        }
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Serialize a value, replacing entity references with their tokens
    ///
    /// Never fails: every value either has a mapping or passes through.
    pub fn serialize(&self, value: &Value, format: Format) -> Serialized {
        match format {
            Format::Native => Serialized::Native(self.replace_entities(value)),
            Format::Json => Serialized::Text(self.encode(value)),
        }
    }

    /// Deserialize a value, resolving recognized tokens to entities
    pub fn deserialize(&self, input: Serialized) -> CodecResult<Value> {
        let value = match input {
            Serialized::Native(v) => v,
            Serialized::Text(text) => Self::parse(&text)?,
        };
        self.resolve_tokens(value)
    }

    /// Serialize straight to JSON text
    pub fn encode(&self, value: &Value) -> String {
        self.to_json(value).to_string()
    }

    /// Deserialize from JSON text
    pub fn decode(&self, text: &str) -> CodecResult<Value> {
        let value = Self::parse(text)?;
        self.resolve_tokens(value)
    }

    /// Convert to a JSON value
    ///
    /// JSON has no representation for entities, so any entity still present
    /// after serialization (nested ones, in shallow mode) is written as its
    /// token string. Non-finite floats become `null`. Map keys are written in
    /// sorted order.
    pub fn to_json(&self, value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(|v| self.to_json(v)).collect())
            }
            Value::Map(fields) => {
                // Sorted so equal maps always encode to the same text
                let mut entries: Vec<_> = fields.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                serde_json::Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), self.to_json(v)))
                        .collect(),
                )
            }
            Value::Entity(e) => serde_json::Value::String(self.token_of(e)),
        }
    }

    fn token_of(&self, entity: &EntityRef) -> String {
        self.resolver.token_of(entity).to_string()
    }

    fn parse(text: &str) -> CodecResult<Value> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Value::from(json))
    }

    fn replace_entities(&self, value: &Value) -> Value {
        match value {
            Value::Entity(e) => Value::String(self.token_of(e)),
            Value::Map(fields) if self.is_deep() => Value::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.replace_entities(v)))
                    .collect(),
            ),
            Value::Array(arr) if self.is_deep() => Value::Array(
                arr.iter()
                    .map(|v| self.replace_entities(v))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_tokens(&self, value: Value) -> CodecResult<Value> {
        match value {
            Value::String(s) => self.resolve_string(s),
            Value::Map(fields) if self.is_deep() => {
                let mut resolved = HashMap::with_capacity(fields.len());
                for (k, v) in fields {
                    resolved.insert(k, self.resolve_tokens(v)?);
                }
                Ok(Value::Map(resolved))
            }
            Value::Array(arr) if self.is_deep() => arr
                .into_iter()
                .map(|v| self.resolve_tokens(v))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    fn resolve_string(&self, raw: String) -> CodecResult<Value> {
        let Some(token) = self.resolver.recognize(&raw) else {
            return Ok(Value::String(raw));
        };

        match self.resolver.lookup(&token) {
            Some(entity) => Ok(Value::Entity(entity)),
            None => match self.config.unresolved {
                UnresolvedPolicy::Fail => Err(CodecError::NotFound(token)),
                UnresolvedPolicy::PassThrough => {
                    tracing::debug!(token = %token, "Unresolved token passed through");
                    Ok(Value::String(raw))
                }
            },
        }
    }

    /// Top-level strings are always inspected; nested ones only in deep mode
    fn is_deep(&self) -> bool {
        self.config.depth == Depth::Deep
    }
}

impl std::fmt::Debug for ValueCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, LocatorRegistry};
    use std::any::Any;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug)]
    struct Kind {
        id: u64,
        name: String,
    }

    impl Entity for Kind {
        fn type_tag(&self) -> &str {
            "Kind"
        }

        fn entity_id(&self) -> String {
            self.id.to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn kind(id: u64) -> EntityRef {
        EntityRef::new(Kind {
            id,
            name: format!("kind-{id}"),
        })
    }

    fn registry() -> Arc<LocatorRegistry> {
        let registry = Arc::new(LocatorRegistry::new());
        registry.register("Kind", |id: &str| {
            let id: u64 = id.parse().ok()?;
            (id != 404).then(|| kind(id))
        });
        registry
    }

    fn codec() -> ValueCodec {
        ValueCodec::new(registry())
    }

    /// Resolver that only knows `Kind` entities and finds none of them
    struct EmptyKinds;

    impl IdentityResolver for EmptyKinds {
        fn lookup(&self, _token: &PortableToken) -> Option<EntityRef> {
            None
        }

        fn handles_type(&self, type_tag: &str) -> bool {
            type_tag == "Kind"
        }
    }

    #[test]
    fn test_serialize_primitives_pass_through() {
        let codec = codec();

        assert_eq!(
            codec.serialize(&Value::from(1), Format::Native),
            Serialized::Native(Value::Int(1))
        );
        assert_eq!(
            codec.serialize(&Value::from("1"), Format::Native),
            Serialized::Native(Value::from("1"))
        );
        assert_eq!(
            codec.serialize(&Value::from(true), Format::Native),
            Serialized::Native(Value::Bool(true))
        );
    }

    #[test]
    fn test_serialize_primitives_as_json() {
        let codec = codec();

        assert_eq!(codec.serialize(&Value::from(1), Format::Json).as_text(), Some("1"));
        assert_eq!(
            codec.serialize(&Value::from("1"), Format::Json).as_text(),
            Some("\"1\"")
        );
        assert_eq!(
            codec.serialize(&Value::from(true), Format::Json).as_text(),
            Some("true")
        );
        assert_eq!(codec.serialize(&Value::Null, Format::Json).as_text(), Some("null"));
    }

    #[test]
    fn test_serialize_map_as_json() {
        let codec = codec();
        let map = Value::map_from_pairs([("a", "b")]);

        assert_eq!(
            codec.serialize(&map, Format::Json).as_text(),
            Some(r#"{"a":"b"}"#)
        );
    }

    #[test]
    fn test_map_encoding_is_stable() {
        let codec = codec();
        let map = Value::map_from_pairs([
            ("zeta", Value::from(1)),
            ("alpha", Value::from(2)),
            ("mid", Value::map_from_pairs([("y", 1), ("b", 2)])),
        ]);

        let expected = r#"{"alpha":2,"mid":{"b":2,"y":1},"zeta":1}"#;
        for _ in 0..8 {
            assert_eq!(codec.encode(&map), expected);
        }
    }

    #[test]
    fn test_deserialize_primitives() {
        let codec = codec();

        for v in [Value::from(1), Value::from("1"), Value::from(true), Value::Null] {
            let serialized = codec.serialize(&v, Format::Native);
            assert_eq!(assert_ok!(codec.deserialize(serialized)), v);
        }
    }

    #[test]
    fn test_deserialize_json_primitives() {
        let codec = codec();

        assert_eq!(assert_ok!(codec.decode("1")), Value::Int(1));
        assert_eq!(assert_ok!(codec.decode("\"1\"")), Value::from("1"));
        assert_eq!(assert_ok!(codec.decode("true")), Value::Bool(true));
        assert_eq!(
            assert_ok!(codec.deserialize(Serialized::Text("1".into()))),
            Value::Int(1)
        );
    }

    #[test]
    fn test_map_round_trip_through_json() {
        let codec = codec();
        let map = Value::map_from_pairs([
            ("a", Value::from("b")),
            ("n", Value::from(2)),
            ("f", Value::from(1.5)),
            ("ok", Value::from(false)),
            ("none", Value::Null),
        ]);

        let text = codec.serialize(&map, Format::Json);
        assert_eq!(assert_ok!(codec.deserialize(text)), map);

        let native = codec.serialize(&map, Format::Native);
        assert_eq!(assert_ok!(codec.deserialize(native)), map);
    }

    #[test]
    fn test_entity_serializes_to_token() {
        let codec = codec();

        assert_eq!(
            codec.serialize(&Value::from(kind(5)), Format::Native),
            Serialized::Native(Value::from("Kind/5"))
        );
        assert_eq!(
            codec.serialize(&Value::from(kind(5)), Format::Json).as_text(),
            Some("\"Kind/5\"")
        );
    }

    #[test]
    fn test_token_deserializes_to_entity() {
        let codec = codec();

        let value = assert_ok!(codec.deserialize(Value::from("Kind/5").into()));
        let entity = value.as_entity().unwrap();
        assert_eq!(entity, &kind(5));
        assert_eq!(
            entity.downcast_ref::<Kind>().map(|k| k.name.as_str()),
            Some("kind-5")
        );

        let from_text = assert_ok!(codec.decode("\"Kind/5\""));
        assert_eq!(from_text, Value::from(kind(5)));
    }

    #[test]
    fn test_entity_round_trip_preserves_identity() {
        let codec = codec();
        let original = Value::from(kind(42));

        let text = codec.serialize(&original, Format::Json);
        assert_eq!(assert_ok!(codec.deserialize(text)), original);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let codec = codec();

        let err = assert_err!(codec.decode("{not json"));
        assert!(matches!(err, CodecError::Parse(_)));
    }

    #[test]
    fn test_unresolved_token_fails_closed_by_default() {
        let codec = codec();

        let err = assert_err!(codec.deserialize(Value::from("Kind/404").into()));
        match err {
            CodecError::NotFound(token) => assert_eq!(token.to_string(), "Kind/404"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolved_token_pass_through_policy() {
        let codec = ValueCodec::with_config(
            registry(),
            CodecConfig::default().with_unresolved(UnresolvedPolicy::PassThrough),
        );

        assert_eq!(
            assert_ok!(codec.deserialize(Value::from("Kind/404").into())),
            Value::from("Kind/404")
        );
    }

    #[test]
    fn test_unrecognized_token_shape_stays_string() {
        let codec = codec();

        // Token-shaped, but no locator for the tag
        assert_eq!(
            assert_ok!(codec.decode("\"Other/5\"")),
            Value::from("Other/5")
        );
        assert_eq!(
            assert_ok!(codec.deserialize(Value::from("room:1").into())),
            Value::from("room:1")
        );
    }

    #[test]
    fn test_token_shaped_strings_round_trip_with_custom_resolver() {
        let codec = ValueCodec::new(EmptyKinds);

        for raw in ["Status/ok", "TCP/IP", "Other/5"] {
            let p = Value::from(raw);
            let native = codec.serialize(&p, Format::Native);
            assert_eq!(assert_ok!(codec.deserialize(native)), p);

            let text = codec.serialize(&p, Format::Json);
            assert_eq!(assert_ok!(codec.deserialize(text)), p);
        }

        // Tags the resolver owns still fail closed
        let err = assert_err!(codec.decode("\"Kind/1\""));
        assert!(matches!(err, CodecError::NotFound(_)));
    }

    #[test]
    fn test_shallow_mode_leaves_nested_values_alone() {
        let codec = codec();
        let map = Value::map_from_pairs([("owner", Value::from(kind(5)))]);

        // Native: untouched
        assert_eq!(
            codec.serialize(&map, Format::Native),
            Serialized::Native(map.clone())
        );

        // JSON text has to carry the token
        let text = codec.serialize(&map, Format::Json);
        assert_eq!(text.as_text(), Some(r#"{"owner":"Kind/5"}"#));

        // ...but decoding does not look inside the map
        assert_eq!(
            assert_ok!(codec.deserialize(text)),
            Value::map_from_pairs([("owner", "Kind/5")])
        );
    }

    #[test]
    fn test_deep_mode_walks_maps_and_arrays() {
        let codec =
            ValueCodec::with_config(registry(), CodecConfig::default().with_depth(Depth::Deep));
        let value = Value::map_from_pairs([
            ("owner", Value::from(kind(5))),
            ("members", Value::from(vec![kind(6), kind(7)])),
            ("label", Value::from("plain")),
        ]);

        let native = codec.serialize(&value, Format::Native);
        let fields = native.as_value().and_then(Value::as_map).unwrap();
        assert_eq!(fields["owner"], Value::from("Kind/5"));
        assert_eq!(fields["members"], Value::from(vec!["Kind/6", "Kind/7"]));

        assert_eq!(assert_ok!(codec.deserialize(native)), value);
    }

    #[test]
    fn test_deep_mode_fails_on_any_missing_entity() {
        let codec =
            ValueCodec::with_config(registry(), CodecConfig::default().with_depth(Depth::Deep));
        let text = r#"{"ok":"Kind/1","missing":["Kind/404"]}"#;

        let err = assert_err!(codec.decode(text));
        assert!(matches!(err, CodecError::NotFound(_)));
    }

    #[test]
    fn test_non_finite_float_encodes_as_null() {
        let codec = codec();
        assert_eq!(codec.encode(&Value::Float(f64::NAN)), "null");
    }
}
