use generated_bindings::{
    DecodeError,
    EntityId,
    Model,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// One entity as served by the indexer: its id and every model attached to
/// it, grouped by namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntity {
    #[serde(rename = "entityId")]
    pub entity_id: EntityId,
    #[serde(default)]
    pub models: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ParsedEntity {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            models: BTreeMap::new(),
        }
    }

    pub fn with_model(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        self.models
            .entry(namespace.into())
            .or_default()
            .insert(name.into(), value);
        self
    }

    pub fn model(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.models.get(namespace).and_then(|models| models.get(name))
    }

    pub fn has_model(&self, namespace: &str, name: &str) -> bool {
        self.model(namespace, name).is_some()
    }

    pub fn decode<M: Model>(&self) -> Result<Option<M>, DecodeError> {
        self.model(M::NAMESPACE, M::NAME)
            .map(M::decode)
            .transpose()
    }
}
