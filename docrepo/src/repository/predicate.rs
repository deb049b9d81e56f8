use crate::document::Document;
use crate::value::Value;
use std::collections::btree_map::{self, BTreeMap};

/// Conjunction of `field == value` pairs.
///
/// Keys are store property names; `_id` addresses the document id. Pairs
/// are kept sorted by key so the composite view key is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pairs: BTreeMap<String, Value>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(field, value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.pairs.insert(field.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.pairs.iter()
    }

    /// True when every pair matches the document exactly. A missing
    /// property never matches.
    pub fn validate(&self, document: &Document) -> bool {
        self.pairs.iter().all(|(k, v)| document.matches(k, v))
    }

    /// View key emitted for matching documents: the requested values in key
    /// order.
    pub fn composite_key(&self) -> Value {
        Value::List(self.pairs.values().cloned().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut predicate = Predicate::new();
        for (k, v) in iter {
            predicate.insert(k, v);
        }
        predicate
    }
}

impl<'a> IntoIterator for &'a Predicate {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}
