//! Schema-driven access without generated code.
//!
//! [`DynamicRepository`] runs the finders declared in a schema against raw
//! documents. The CLI uses it; applications normally use the generated
//! repositories instead.

use crate::config::EngineConfig;
use crate::document::{Document, Properties};
use crate::error::{DocRepoError, Result};
use crate::repository::{Entity, Predicate, Repository};
use crate::schema::{EntitySchema, FinderSpec};
use crate::store::DocumentStore;
use crate::value::Value;
use std::ops::Deref;
use std::sync::Arc;

/// An entity held as its raw document properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicEntity {
    pub id: Option<String>,
    pub properties: Properties,
}

impl Entity for DynamicEntity {
    fn document_id(&self) -> Option<String> {
        self.id.clone()
    }

    fn serialize(&self) -> Properties {
        self.properties.clone()
    }

    fn unserialize(document: &Document) -> Self {
        DynamicEntity {
            id: Some(document.id.clone()),
            properties: document.properties.clone(),
        }
    }
}

impl DynamicEntity {
    /// Render the entity as JSON using the schema's field names.
    pub fn to_json(&self, schema: &EntitySchema) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for field in schema.persisted_fields() {
            let value = if field.binds_native_id() {
                self.id.clone().map(Value::String)
            } else {
                self.properties.get(&field.store_property).cloned()
            };
            if let Some(value) = value {
                out.insert(field.name.clone(), value_to_json(&value));
            }
        }
        let id_bound = schema.identity().is_some_and(|f| f.binds_native_id());
        if !id_bound {
            if let Some(id) = &self.id {
                out.insert("_id".to_string(), serde_json::Value::String(id.clone()));
            }
        }
        serde_json::Value::Object(out)
    }
}

/// Plain JSON rendering of a property value (widths are not preserved).
pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Byte(v) => Json::from(*v),
        Value::Short(v) => Json::from(*v),
        Value::Int(v) => Json::from(*v),
        Value::Long(v) => Json::from(*v),
        Value::Float(v) => Json::from(f64::from(*v)),
        Value::Double(v) => Json::from(*v),
        Value::Char(v) => Json::String(v.to_string()),
        Value::String(v) => Json::String(v.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

/// Repository over [`DynamicEntity`] that knows its schema's finders.
pub struct DynamicRepository {
    schema: EntitySchema,
    finders: Vec<FinderSpec>,
    repository: Repository<DynamicEntity>,
}

impl DynamicRepository {
    pub fn new(store: Arc<dyn DocumentStore>, schema: EntitySchema, config: EngineConfig) -> Self {
        let repository = Repository::with_config(store, schema.type_tag.clone(), config);
        DynamicRepository {
            finders: schema.finders(),
            schema,
            repository,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn finders(&self) -> &[FinderSpec] {
        &self.finders
    }

    /// Build a predicate from `field=value` text pairs, parsing each value
    /// with its field's declared type.
    pub fn predicate<S: AsRef<str>>(&self, pairs: &[(S, S)]) -> Result<Predicate> {
        let mut predicate = Predicate::new();
        for (name, raw) in pairs {
            let name = name.as_ref();
            let field = self.schema.field(name).ok_or_else(|| DocRepoError::InvalidValue {
                field: name.to_string(),
                reason: format!("'{}' has no such field", self.schema.name),
            })?;
            let value = field.field_type.parse_value(name, raw.as_ref())?;
            predicate.insert(field.store_property.clone(), value);
        }
        Ok(predicate)
    }

    /// Run a declared finder by method name with positional arguments.
    pub fn call_finder(&self, method: &str, args: &[Value]) -> Result<Vec<DynamicEntity>> {
        let finder = self.declared_finder(method, args.len())?;
        self.run_finder(finder, args.iter().cloned())
    }

    /// Like [`call_finder`](Self::call_finder), parsing each textual
    /// argument with the type of the parameter it binds to.
    pub fn call_finder_str<S: AsRef<str>>(
        &self,
        method: &str,
        args: &[S],
    ) -> Result<Vec<DynamicEntity>> {
        let finder = self.declared_finder(method, args.len())?;
        let values = finder
            .fields
            .iter()
            .zip(args)
            .map(|(field, raw)| field.field_type.parse_value(&field.name, raw.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.run_finder(finder, values)
    }

    fn declared_finder(&self, method: &str, arity: usize) -> Result<&FinderSpec> {
        let finder = self
            .finders
            .iter()
            .find(|f| f.method_name == method)
            .ok_or_else(|| {
                DocRepoError::Other(format!("'{}' declares no finder '{method}'", self.schema.name))
            })?;
        if finder.fields.len() != arity {
            return Err(DocRepoError::Other(format!(
                "{method} takes {} argument(s), got {arity}",
                finder.fields.len()
            )));
        }
        Ok(finder)
    }

    fn run_finder(
        &self,
        finder: &FinderSpec,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<DynamicEntity>> {
        let predicate: Predicate = finder
            .fields
            .iter()
            .zip(args)
            .map(|(field, value)| (field.store_property.clone(), value))
            .collect();
        let mut found = self.repository.try_find_by(&predicate)?;
        if finder.unique {
            found.truncate(1);
        }
        Ok(found)
    }
}

impl Deref for DynamicRepository {
    type Target = Repository<DynamicEntity>;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType, IndexDescriptor};
    use crate::store::SqliteStore;

    fn point_schema() -> EntitySchema {
        EntitySchema::builder("Point", "point")
            .field(FieldDescriptor::new("id", FieldType::String).property("_id"))
            .field(FieldDescriptor::new("label", FieldType::String).property("lbl").indexed(true))
            .field(FieldDescriptor::new("x", FieldType::Int))
            .field(FieldDescriptor::new("y", FieldType::Int))
            .index(IndexDescriptor::new(["x", "y"]))
            .build()
            .unwrap()
    }

    fn setup() -> DynamicRepository {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        DynamicRepository::new(store, point_schema(), EngineConfig::default())
    }

    fn point(label: &str, x: i32, y: i32) -> DynamicEntity {
        let mut properties = Properties::new();
        properties.insert("lbl".into(), Value::from(label));
        properties.insert("x".into(), Value::Int(x));
        properties.insert("y".into(), Value::Int(y));
        DynamicEntity {
            id: None,
            properties,
        }
    }

    #[test]
    fn test_predicate_parses_by_field_type() {
        let repo = setup();
        let predicate = repo.predicate(&[("x", "1"), ("label", "a")]).unwrap();
        assert_eq!(
            predicate,
            Predicate::new().with("x", Value::Int(1)).with("lbl", "a")
        );
        assert!(repo.predicate(&[("x", "one")]).is_err());
        assert!(repo.predicate(&[("z", "1")]).is_err());
    }

    #[test]
    fn test_call_composite_finder() {
        let repo = setup();
        let first = repo.save(&point("a", 1, 2));
        repo.save(&point("b", 1, 3));

        let found = repo
            .call_finder("find_by_x_and_y", &[Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(found, vec![first]);
    }

    #[test]
    fn test_call_unique_finder_returns_at_most_one() {
        let repo = setup();
        let first = repo.save(&point("same", 1, 1));
        repo.save(&point("same", 2, 2));
        let found = repo
            .call_finder("find_one_by_label", &[Value::from("same")])
            .unwrap();
        assert_eq!(found, vec![first]);
    }

    #[test]
    fn test_call_finder_errors() {
        let repo = setup();
        assert!(repo.call_finder("find_by_nothing", &[]).is_err());
        assert!(repo.call_finder("find_by_x_and_y", &[Value::Int(1)]).is_err());
        assert!(repo.call_finder_str("find_by_x_and_y", &["1", "2", "3"]).is_err());
        assert!(repo.call_finder_str("find_by_x_and_y", &["1", "two"]).is_err());
    }

    #[test]
    fn test_call_finder_str_parses_by_parameter_type() {
        let repo = setup();
        let first = repo.save(&point("a", 1, 2));
        repo.save(&point("b", 1, 3));
        assert_eq!(
            repo.call_finder_str("find_by_x_and_y", &["1", "2"]).unwrap(),
            vec![first]
        );
    }

    #[test]
    fn test_non_finite_save_leaves_store_queryable() {
        let repo = setup();
        let keep = repo.save(&point("keep", 1, 1));
        let mut bad = point("bad", 2, 2);
        bad.properties.insert("w".into(), Value::Double(f64::NAN));

        assert!(matches!(
            repo.try_save(&bad),
            Err(DocRepoError::InvalidValue { .. })
        ));
        assert_eq!(repo.try_find_all().unwrap(), vec![keep.clone()]);
        assert_eq!(
            repo.call_finder("find_one_by_label", &[Value::from("keep")]).unwrap(),
            vec![keep]
        );
    }

    #[test]
    fn test_to_json_uses_field_names() {
        let repo = setup();
        let saved = repo.save(&point("a", 1, 2));
        let json = saved.to_json(repo.schema());
        assert_eq!(json["label"], "a");
        assert_eq!(json["x"], 1);
        assert_eq!(json["id"], serde_json::Value::String(saved.id.unwrap()));
    }
}
