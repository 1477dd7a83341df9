use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A document identifier plus its opaque source body
///
/// Re-writing the same identifier overwrites the previous body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// The fields of an alias definition that get replayed onto a target index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_routing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_routing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_write_index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
}

impl AliasDefinition {
    /// Build from an alias body as returned by `GET <index>/_alias`
    ///
    /// Unknown keys are ignored; a plain `routing` key fills both routings when
    /// the specific ones are absent.
    pub fn from_value(value: &Value) -> Self {
        let routing = value.get("routing").and_then(Value::as_str);
        let string_field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .or(routing)
                .map(str::to_string)
        };

        Self {
            filter: value.get("filter").cloned(),
            index_routing: string_field("index_routing"),
            search_routing: string_field("search_routing"),
            is_write_index: value.get("is_write_index").and_then(Value::as_bool),
            is_hidden: value.get("is_hidden").and_then(Value::as_bool),
        }
    }
}

/// Name plus the opaque metadata blobs of one index
///
/// The name is the join key; settings and mappings are never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, AliasDefinition>,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_schema(&self) -> bool {
        self.settings.is_some() || self.mappings.is_some()
    }
}

/// One row of an index listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub name: String,
    pub document_count: u64,
    pub size: String,
    pub health: String,
    pub status: String,
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

/// Identity snapshot of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub cluster_uuid: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lucene_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_wire_names() {
        let doc = Document::new("42", json!({"level": "warn"}));
        let encoded = serde_json::to_value(&doc).unwrap();
        assert_eq!(encoded, json!({"_id": "42", "_source": {"level": "warn"}}));
    }

    #[test]
    fn test_alias_from_value() {
        let alias = AliasDefinition::from_value(&json!({
            "filter": {"term": {"tenant": "a"}},
            "routing": "1",
            "is_write_index": true
        }));
        assert_eq!(alias.index_routing.as_deref(), Some("1"));
        assert_eq!(alias.search_routing.as_deref(), Some("1"));
        assert_eq!(alias.is_write_index, Some(true));
        assert!(alias.filter.is_some());
        assert_eq!(alias.is_hidden, None);
    }

    #[test]
    fn test_alias_specific_routing_wins() {
        let alias = AliasDefinition::from_value(&json!({
            "routing": "1",
            "search_routing": "2"
        }));
        assert_eq!(alias.index_routing.as_deref(), Some("1"));
        assert_eq!(alias.search_routing.as_deref(), Some("2"));
    }

    #[test]
    fn test_descriptor_skips_empty_parts() {
        let descriptor = IndexDescriptor::new("logs");
        assert!(!descriptor.has_schema());
        assert_eq!(serde_json::to_value(&descriptor).unwrap(), json!({"name": "logs"}));
    }
}
