//! Tag, service and relationship pair types.

use crate::config::RelationshipConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between a tag's namespace and its subtag.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Identifier of a tag source.
///
/// One reserved value names the synthetic combined service, see
/// [`ServiceId::combined`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The synthetic service representing the union of all real services.
    pub fn combined() -> Self {
        Self(RelationshipConfig::COMBINED_SERVICE_KEY.to_string())
    }

    pub fn is_combined(&self) -> bool {
        self.0 == RelationshipConfig::COMBINED_SERVICE_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// `bad` is a deprecated alias of the preferred `good`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiblingPair {
    pub bad: String,
    pub good: String,
}

impl SiblingPair {
    pub fn new(bad: impl Into<String>, good: impl Into<String>) -> Self {
        Self {
            bad: bad.into(),
            good: good.into(),
        }
    }
}

/// Anything tagged `child` is implicitly tagged `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentPair {
    pub child: String,
    pub parent: String,
}

impl ParentPair {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }
}

/// Split a tag into `(namespace, subtag)`.
///
/// Unnamespaced tags get an empty namespace. Only the first separator counts,
/// so `"title:re:zero"` splits into `("title", "re:zero")`.
pub fn split_tag(tag: &str) -> (&str, &str) {
    match tag.split_once(NAMESPACE_SEPARATOR) {
        Some((namespace, subtag)) => (namespace, subtag),
        None => ("", tag),
    }
}

/// Join a namespace and subtag back into a tag.
pub fn combine_tag(namespace: &str, subtag: &str) -> String {
    if namespace.is_empty() {
        subtag.to_string()
    } else {
        format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, subtag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_service() {
        assert!(ServiceId::combined().is_combined());
        assert!(!ServiceId::new("my tags").is_combined());
        assert_eq!(ServiceId::new("my tags").to_string(), "my tags");
    }

    #[test]
    fn test_split_tag() {
        assert_eq!(split_tag("character:samus aran"), ("character", "samus aran"));
        assert_eq!(split_tag("samus aran"), ("", "samus aran"));
        assert_eq!(split_tag("title:re:zero"), ("title", "re:zero"));
        assert_eq!(split_tag("series:"), ("series", ""));
    }

    #[test]
    fn test_combine_tag() {
        assert_eq!(combine_tag("", "samus"), "samus");
        assert_eq!(combine_tag("character", "samus"), "character:samus");
    }

    #[test]
    fn test_service_id_serializes_transparently() {
        let json = serde_json::to_string(&ServiceId::new("public tag repo")).unwrap();
        assert_eq!(json, "\"public tag repo\"");
    }
}
