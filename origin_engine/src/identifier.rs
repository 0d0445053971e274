/// Origin Engine: Identifiers
///
/// Every registry entry is addressed by a `namespace:path` identifier.
/// Namespace: `[a-z0-9_.-]+`. Path: `[a-z0-9_.-/]+`.
/// A bare path (or an empty namespace) falls back to `minecraft`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IdentifierError;

/// Namespace used when the text carries none.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Namespace of every built-in entry.
pub const ORIGINS_NAMESPACE: &str = "origins";

/// A parsed `namespace:path` location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    namespace: String,
    path: String,
}

impl Identifier {
    /// Build an identifier from its two halves, validating both.
    pub fn new(namespace: &str, path: &str) -> Result<Self, IdentifierError> {
        let namespace = if namespace.is_empty() { DEFAULT_NAMESPACE } else { namespace };
        if !namespace.chars().all(is_namespace_char) {
            return Err(IdentifierError::InvalidNamespace(namespace.to_string()));
        }
        if path.is_empty() {
            return Err(IdentifierError::EmptyPath);
        }
        if !path.chars().all(is_path_char) {
            return Err(IdentifierError::InvalidPath(path.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Parse `namespace:path` or a bare `path`.
    pub fn parse(text: &str) -> Result<Self, IdentifierError> {
        match text.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::new(DEFAULT_NAMESPACE, text),
        }
    }

    /// Lenient parse: `None` on malformed text.
    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Built-in identifiers are known-valid; skip validation.
    pub(crate) fn builtin(path: &str) -> Self {
        Self {
            namespace: ORIGINS_NAMESPACE.to_string(),
            path: path.to_string(),
        }
    }
}

fn is_namespace_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '.' | '-')
}

fn is_path_char(ch: char) -> bool {
    is_namespace_char(ch) || ch == '/'
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Declares a typed registry key wrapping an [`Identifier`].
macro_rules! resource_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Identifier);

        impl $name {
            pub fn new(location: Identifier) -> Self {
                Self(location)
            }

            pub fn parse(text: &str) -> Result<Self, IdentifierError> {
                Identifier::parse(text).map(Self)
            }

            /// The registry location this key points at.
            pub fn location(&self) -> &Identifier {
                &self.0
            }
        }

        impl From<Identifier> for $name {
            fn from(location: Identifier) -> Self {
                Self(location)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

resource_key!(
    /// Key into the layer registry.
    LayerKey
);
resource_key!(
    /// Key into the origin registry.
    OriginKey
);
resource_key!(
    /// Key into the power registry.
    PowerKey
);
resource_key!(
    /// Provenance tag attached to every power grant.
    PowerSource
);

impl OriginKey {
    /// The sentinel "no origin" key.
    pub fn empty() -> Self {
        Self(Identifier::builtin("empty"))
    }

    pub fn is_empty(&self) -> bool {
        self.0.namespace == ORIGINS_NAMESPACE && self.0.path == "empty"
    }
}

/// Provenance of every power granted by `origin`.
///
/// Identity transform of the origin location: namespace and path are kept
/// as-is. Stored grants depend on these exact values, so the transform must
/// never change.
pub fn power_source(origin: &OriginKey) -> PowerSource {
    PowerSource(origin.location().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_namespace() {
        let id = Identifier::parse("origins:merling").unwrap();
        assert_eq!(id.namespace(), "origins");
        assert_eq!(id.path(), "merling");
        assert_eq!(id.to_string(), "origins:merling");
    }

    #[test]
    fn test_parse_defaults_namespace() {
        assert_eq!(Identifier::parse("stone").unwrap().to_string(), "minecraft:stone");
        assert_eq!(Identifier::parse(":stone").unwrap().to_string(), "minecraft:stone");
    }

    #[test]
    fn test_parse_nested_path() {
        let id = Identifier::parse("origins:flight/elytra").unwrap();
        assert_eq!(id.path(), "flight/elytra");
    }

    #[test]
    fn test_parse_rejects_bad_text() {
        assert_eq!(Identifier::parse("origins:"), Err(IdentifierError::EmptyPath));
        assert!(matches!(
            Identifier::parse("Origins:merling"),
            Err(IdentifierError::InvalidNamespace(_))
        ));
        assert!(matches!(
            Identifier::parse("origins:has space"),
            Err(IdentifierError::InvalidPath(_))
        ));
        assert!(Identifier::try_parse("a:b:c").is_none());
    }

    #[test]
    fn test_empty_origin_sentinel() {
        assert!(OriginKey::empty().is_empty());
        assert_eq!(OriginKey::empty().to_string(), "origins:empty");
        assert!(!OriginKey::parse("origins:human").unwrap().is_empty());
    }

    #[test]
    fn test_power_source_is_identity() {
        let origin = OriginKey::parse("origins:merling").unwrap();
        assert_eq!(power_source(&origin).location(), origin.location());
        assert_eq!(power_source(&origin), power_source(&origin.clone()));
    }

    #[test]
    fn test_serde_as_string() {
        let key = LayerKey::parse("origins:origin").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"origins:origin\"");
        let back: LayerKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<LayerKey>("\"Bad Key\"").is_err());
    }
}
