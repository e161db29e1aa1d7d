//! MCP capability maps
//!
//! Capabilities are exchanged during the initialization handshake. The engine
//! checks them as an untyped [`Capabilities`] map (capability name to a
//! sub-object of feature flags); [`ClientCapabilities`] and
//! [`ServerCapabilities`] are the typed builders applications usually start
//! from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Untyped capability map, e.g. `{"resources": {"subscribe": true}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    /// Empty capability set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any serializable capability struct.
    ///
    /// Anything that does not serialize to a JSON object yields an empty set.
    #[must_use]
    pub fn from_serializable<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }

    /// Add (or replace) a capability
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, features: Value) -> Self {
        self.0.insert(name.into(), features);
        self
    }

    /// Whether the named capability is declared at all
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !v.is_null())
    }

    /// Check a capability or a `capability.feature` path.
    ///
    /// A feature counts as present when its flag is anything other than
    /// `false` or `null`.
    #[must_use]
    pub fn supports(&self, path: &str) -> bool {
        match path.split_once('.') {
            None => self.has(path),
            Some((name, feature)) => self
                .0
                .get(name)
                .and_then(|v| v.get(feature))
                .is_some_and(|flag| !matches!(flag, Value::Null | Value::Bool(false))),
        }
    }

    /// Raw access to one capability's feature object
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Shallow per-key union. Feature objects under the same capability are
    /// merged key by key, `other` winning on conflicts.
    pub fn merge(&mut self, other: Capabilities) {
        for (name, incoming) in other.0 {
            match (self.0.get_mut(&name), incoming) {
                (Some(Value::Object(existing)), Value::Object(features)) => {
                    existing.extend(features);
                }
                (_, incoming) => {
                    self.0.insert(name, incoming);
                }
            }
        }
    }

    /// Whether no capability is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying JSON object
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Capabilities {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<ClientCapabilities> for Capabilities {
    fn from(caps: ClientCapabilities) -> Self {
        Self::from_serializable(&caps)
    }
}

impl From<ServerCapabilities> for Capabilities {
    fn from(caps: ServerCapabilities) -> Self {
        Self::from_serializable(&caps)
    }
}

/// Client capabilities
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {
    /// Experimental, non-standard capabilities that the client supports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,

    /// Present if the client supports listing roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,

    /// Present if the client supports sampling from an LLM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<FeatureFlag>,

    /// Present if the client supports elicitation from the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<FeatureFlag>,
}

/// Server capabilities
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Experimental, non-standard capabilities that the server supports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,

    /// Present if the server sends log messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<FeatureFlag>,

    /// Present if the server offers argument completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<FeatureFlag>,

    /// Present if the server offers prompt templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapabilities>,

    /// Present if the server offers resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapabilities>,

    /// Present if the server offers tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapabilities>,
}

/// A capability with no sub-features; serializes as `{}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FeatureFlag {}

/// Roots capabilities
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootsCapabilities {
    /// Whether list can change
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Prompts or tools capabilities
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListChangedCapabilities {
    /// Whether list can change
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capabilities
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesCapabilities {
    /// Whether subscribe is supported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,

    /// Whether list can change
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_typed_server_caps_convert() {
        let caps: Capabilities = ServerCapabilities {
            tools: Some(ListChangedCapabilities::default()),
            resources: Some(ResourcesCapabilities {
                subscribe: Some(true),
                list_changed: None,
            }),
            ..Default::default()
        }
        .into();

        assert!(caps.has("tools"));
        assert!(caps.supports("resources.subscribe"));
        assert!(!caps.supports("resources.listChanged"));
        assert!(!caps.has("prompts"));
    }

    #[test]
    fn test_feature_flag_is_empty_object() {
        let caps: Capabilities = ClientCapabilities {
            sampling: Some(FeatureFlag {}),
            ..Default::default()
        }
        .into();
        assert_eq!(caps.get("sampling"), Some(&json!({})));
    }

    #[test]
    fn test_merge_is_shallow_per_key() {
        let mut caps = Capabilities::new()
            .with("resources", json!({ "subscribe": true }))
            .with("logging", json!({}));
        caps.merge(
            Capabilities::new()
                .with("resources", json!({ "listChanged": true }))
                .with("tools", json!({})),
        );

        assert_eq!(
            serde_json::to_value(&caps).unwrap(),
            json!({
                "resources": { "subscribe": true, "listChanged": true },
                "logging": {},
                "tools": {}
            })
        );
    }

    #[test]
    fn test_false_flag_not_supported() {
        let caps = Capabilities::new().with("roots", json!({ "listChanged": false }));
        assert!(caps.has("roots"));
        assert!(!caps.supports("roots.listChanged"));
    }
}
