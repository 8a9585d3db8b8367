//! Provider metadata bag.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider-defined key/value metadata attached to a media.
///
/// Remote providers store the fetched oEmbed document here verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProviderMetadata(pub Map<String, Value>);

impl ProviderMetadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value; non-object values yield an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Get an unsigned value, accepting numeric strings.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let metadata = ProviderMetadata::from_value(json!({
            "title": "Nono le petit robot",
            "width": 425,
            "height": "344",
            "thumbnail_width": -1
        }));

        assert_eq!(metadata.get_str("title"), Some("Nono le petit robot"));
        assert_eq!(metadata.get_u32("width"), Some(425));
        assert_eq!(metadata.get_u32("height"), Some(344));
        assert_eq!(metadata.get_u32("thumbnail_width"), None);
        assert_eq!(metadata.get_str("missing"), None);
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(ProviderMetadata::from_value(json!([1, 2])).is_empty());
    }
}
