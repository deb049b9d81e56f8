use super::model::EntitySchema;
use super::types::SchemaDefinition;
use crate::error::Result;
use std::path::Path;

/// Parse a schema.yaml file into a SchemaDefinition
pub fn parse_schema(path: &Path) -> Result<SchemaDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema YAML string into a SchemaDefinition
pub fn parse_schema_str(content: &str) -> Result<SchemaDefinition> {
    let schema: SchemaDefinition = serde_yaml::from_str(content)?;
    Ok(schema)
}

/// Build the model of every declared entity, in discovery order.
/// Stops at the first entity that cannot be mapped.
pub fn load_entities(schema: &SchemaDefinition) -> Result<Vec<EntitySchema>> {
    schema
        .entities
        .iter()
        .map(EntitySchema::from_definition)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewLifecycle;
    use crate::schema::{DeclarationKind, FieldType};

    const SCHEMA: &str = r#"
facade: Shop
engine:
  view_lifecycle: drop
entities:
  - name: Category
    type: category
    package: shop.catalog
    fields:
      - { name: id, type: string, property: _id }
      - { name: name, type: string, property: category_name, index: { unique: true } }
      - { name: parent, type: string, index: {} }
    indexes:
      - { fields: [name, parent] }
  - name: Product
    type: product
    fields:
      - { name: sku, type: string, id: true }
      - { name: price, type: double }
"#;

    #[test]
    fn test_parse_schema_str() {
        let schema = parse_schema_str(SCHEMA).unwrap();
        assert_eq!(schema.facade_name(), "Shop");
        assert_eq!(schema.engine.view_lifecycle, ViewLifecycle::Drop);
        assert_eq!(schema.entities.len(), 2);

        let category = schema.entity("Category").unwrap();
        assert_eq!(category.kind, DeclarationKind::Class);
        assert_eq!(category.type_tag, "category");
        assert_eq!(category.fields[1].property.as_deref(), Some("category_name"));
        assert!(category.fields[1].index.unwrap().unique);
        assert!(!category.fields[2].index.unwrap().unique);
        assert_eq!(category.indexes[0].fields, vec!["name", "parent"]);
        assert!(!category.indexes[0].unique);
    }

    #[test]
    fn test_load_entities_keeps_discovery_order() {
        let schema = parse_schema_str(SCHEMA).unwrap();
        let entities = load_entities(&schema).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Category", "Product"]);

        let sku = entities[1].identity().unwrap();
        assert_eq!(sku.name, "sku");
        assert!(!sku.binds_native_id());
        assert_eq!(entities[1].field("price").unwrap().field_type, FieldType::Double);
    }

    #[test]
    fn test_unknown_kind_is_kept_for_diagnostics() {
        let schema = parse_schema_str(
            "entities:\n  - { name: Shape, kind: record, type: shape }\n",
        )
        .unwrap();
        assert_eq!(
            schema.entities[0].kind,
            DeclarationKind::Other("record".into())
        );
        assert!(load_entities(&schema).is_err());
    }

    #[test]
    fn test_parse_schema_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("schema.yaml");
        std::fs::write(&path, SCHEMA).unwrap();
        let schema = parse_schema(&path).unwrap();
        assert_eq!(schema.entities.len(), 2);
    }
}
