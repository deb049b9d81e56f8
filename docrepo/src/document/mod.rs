// Document model - the store's unit of persistence

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property bag of a document, keyed by store property name.
pub type Properties = BTreeMap<String, Value>;

/// Property name under which the store exposes a document's native identifier.
pub const NATIVE_ID_PROPERTY: &str = "_id";

/// A document as held by the store: an identifier plus its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_properties(id: impl Into<String>, properties: Properties) -> Self {
        Document {
            id: id.into(),
            properties,
        }
    }

    /// Get a stored property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Check whether `name` holds exactly `expected`. The `id` and `_id` keys
    /// address the native document identifier.
    pub fn matches(&self, name: &str, expected: &Value) -> bool {
        if is_native_id(name) {
            return matches!(expected, Value::String(id) if *id == self.id);
        }
        self.properties.get(name) == Some(expected)
    }
}

/// True when a store property name binds to the native document identifier
/// rather than a stored property.
pub fn is_native_id(property: &str) -> bool {
    property == "id" || property == NATIVE_ID_PROPERTY
}
