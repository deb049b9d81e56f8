use super::types::{
    DeclarationKind, EntityDefinition, FieldDefinition, FieldIndex, FieldType, IndexDefinition,
};
use crate::document::is_native_id;
use crate::error::{DocRepoError, Result};
use heck::ToSnakeCase;
use serde::Serialize;
use std::collections::HashSet;

/// Suffix appended to an entity's package to place its generated code.
pub const PROXY_MODULE: &str = "proxy";

/// In-memory description of one entity: its type tag, fields and indexes.
///
/// Built from an [`EntityDefinition`] (see [`EntitySchema::from_definition`])
/// or assembled in code with [`EntitySchema::builder`]. Both the query engine
/// and the code generator consume this model.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySchema {
    pub name: String,
    pub type_tag: String,
    pub package: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub store_property: String,
    pub field_type: FieldType,
    pub identity: bool,
    pub index: Option<FieldIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub fields: Vec<String>,
    pub unique: bool,
}

/// One finder method derived from an index declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinderSpec {
    /// e.g. `find_by_name`, `find_one_by_name_and_parent`
    pub method_name: String,
    pub unique: bool,
    /// Parameters, in index declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        FieldDescriptor {
            store_property: name.clone(),
            name,
            field_type,
            identity: false,
            index: None,
        }
    }

    /// Bind the field to a different store property.
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.store_property = property.into();
        if is_native_id(&self.store_property) {
            self.identity = true;
        }
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn indexed(mut self, unique: bool) -> Self {
        self.index = Some(FieldIndex { unique });
        self
    }

    /// True when the field reads and writes the document's own id instead of
    /// a stored property.
    pub fn binds_native_id(&self) -> bool {
        is_native_id(&self.store_property)
    }

    /// Fields that take part in serialization and finders.
    pub fn is_persisted(&self) -> bool {
        self.field_type.is_supported()
    }

    fn from_definition(def: &FieldDefinition) -> Self {
        let store_property = match def.property.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => def.name.clone(),
        };
        FieldDescriptor {
            identity: def.id || is_native_id(&store_property),
            name: def.name.clone(),
            store_property,
            field_type: def.field_type,
            index: def.index,
        }
    }

    fn to_definition(&self) -> FieldDefinition {
        FieldDefinition {
            name: self.name.clone(),
            field_type: self.field_type,
            property: Some(self.store_property.clone()),
            id: self.identity,
            index: self.index,
        }
    }
}

impl IndexDescriptor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexDescriptor {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl EntitySchema {
    /// Build the model for a declared entity, enforcing its invariants.
    pub fn from_definition(def: &EntityDefinition) -> Result<Self> {
        if def.kind != DeclarationKind::Class {
            return Err(DocRepoError::Schema(format!(
                "'{}' is declared as {}; only classes can be mapped to documents",
                def.name, def.kind
            )));
        }
        if def.type_tag.trim().is_empty() {
            return Err(DocRepoError::Schema(format!(
                "'{}' has an empty type tag",
                def.name
            )));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(def.fields.len());
        for field_def in &def.fields {
            if !seen.insert(field_def.name.as_str()) {
                log::debug!(
                    "Duplicate field '{}' in '{}' ignored",
                    field_def.name,
                    def.name
                );
                continue;
            }
            fields.push(FieldDescriptor::from_definition(field_def));
        }

        let identities: Vec<&str> = fields
            .iter()
            .filter(|f| f.identity)
            .map(|f| f.name.as_str())
            .collect();
        if identities.len() > 1 {
            return Err(DocRepoError::Schema(format!(
                "'{}' marks more than one identity field: {}",
                def.name,
                identities.join(", ")
            )));
        }

        let indexes = def
            .indexes
            .iter()
            .map(|i| IndexDescriptor {
                fields: i.fields.clone(),
                unique: i.unique,
            })
            .collect();

        Ok(EntitySchema {
            name: def.name.clone(),
            type_tag: def.type_tag.clone(),
            package: def.package.clone(),
            fields,
            indexes,
        })
    }

    pub fn builder(name: impl Into<String>, type_tag: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            definition: EntityDefinition {
                name: name.into(),
                kind: DeclarationKind::Class,
                type_tag: type_tag.into(),
                package: None,
                fields: Vec::new(),
                indexes: Vec::new(),
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn identity(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.identity)
    }

    /// Fields that take part in serialization.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_persisted())
    }

    /// Module path of the generated code: the package segments followed by
    /// the proxy module.
    pub fn module_path(&self) -> Vec<String> {
        let mut path: Vec<String> = self
            .package
            .as_deref()
            .unwrap_or_default()
            .split(['.', ':'])
            .filter(|s| !s.is_empty())
            .map(|s| s.to_snake_case())
            .collect();
        path.push(PROXY_MODULE.to_string());
        path
    }

    /// Derive the finder methods declared by this entity.
    ///
    /// Field-level indexes come first, in field order, followed by
    /// entity-level indexes in declaration order. An index naming an unknown
    /// or unsupported field yields no finder. Finders resolving to a method
    /// name that already exists are dropped.
    pub fn finders(&self) -> Vec<FinderSpec> {
        let mut finders: Vec<FinderSpec> = Vec::new();
        let mut push = |finder: FinderSpec| {
            if finders.iter().any(|f| f.method_name == finder.method_name) {
                log::debug!("Duplicate finder '{}' on '{}' collapsed", finder.method_name, self.name);
            } else {
                finders.push(finder);
            }
        };

        for field in &self.fields {
            if let Some(index) = field.index {
                if field.is_persisted() {
                    push(FinderSpec::new(vec![field.clone()], index.unique));
                }
            }
        }

        for index in &self.indexes {
            if index.fields.is_empty() {
                continue;
            }
            let resolved: Option<Vec<FieldDescriptor>> = index
                .fields
                .iter()
                .map(|name| self.field(name).filter(|f| f.is_persisted()).cloned())
                .collect();
            match resolved {
                Some(fields) => push(FinderSpec::new(fields, index.unique)),
                None => log::debug!(
                    "Index ({}) on '{}' references unknown fields; no finder generated",
                    index.fields.join(", "),
                    self.name
                ),
            }
        }

        finders
    }
}

impl FinderSpec {
    pub fn new(fields: Vec<FieldDescriptor>, unique: bool) -> Self {
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        FinderSpec {
            method_name: finder_method_name(&names, unique),
            unique,
            fields,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }
}

/// Name of the finder for the given fields: `find_by_a_and_b`, or
/// `find_one_by_a_and_b` for unique indexes.
pub fn finder_method_name(fields: &[&str], unique: bool) -> String {
    let prefix = if unique { "find_one_by" } else { "find_by" };
    let joined = fields
        .iter()
        .map(|f| f.to_snake_case())
        .collect::<Vec<_>>()
        .join("_and_");
    format!("{prefix}_{joined}")
}

/// Fluent construction of an [`EntitySchema`] without a schema file.
pub struct EntitySchemaBuilder {
    definition: EntityDefinition,
}

impl EntitySchemaBuilder {
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.definition.package = Some(package.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.definition.fields.push(field.to_definition());
        self
    }

    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.definition.indexes.push(IndexDefinition {
            fields: index.fields,
            unique: index.unique,
        });
        self
    }

    pub fn build(self) -> Result<EntitySchema> {
        EntitySchema::from_definition(&self.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn category() -> EntitySchema {
        EntitySchema::builder("Category", "category")
            .package("shop.catalog")
            .field(FieldDescriptor::new("id", FieldType::String).property("_id"))
            .field(FieldDescriptor::new("name", FieldType::String).property("category_name").indexed(true))
            .field(FieldDescriptor::new("parent", FieldType::String).indexed(false))
            .field(FieldDescriptor::new("position", FieldType::Int))
            .index(IndexDescriptor::new(["name"]).unique())
            .index(IndexDescriptor::new(["parent", "position"]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_native_id_implies_identity() {
        let schema = category();
        let id = schema.identity().unwrap();
        assert_eq!(id.name, "id");
        assert!(id.binds_native_id());
        assert_eq!(schema.field("name").unwrap().store_property, "category_name");
    }

    #[test]
    fn test_finders_deduplicate_same_shape() {
        let names: Vec<String> = category().finders().into_iter().map(|f| f.method_name).collect();
        assert_eq!(
            names,
            vec![
                "find_one_by_name".to_string(),
                "find_by_parent".to_string(),
                "find_by_parent_and_position".to_string(),
            ]
        );
    }

    #[test]
    fn test_unknown_index_field_yields_no_finder() {
        let schema = EntitySchema::builder("Tag", "tag")
            .field(FieldDescriptor::new("label", FieldType::String))
            .index(IndexDescriptor::new(["label", "missing"]))
            .index(IndexDescriptor::new(Vec::<String>::new()))
            .build()
            .unwrap();
        assert!(schema.finders().is_empty());
    }

    #[test]
    fn test_entity_fields_are_not_indexed() {
        let schema = EntitySchema::builder("Item", "item")
            .field(FieldDescriptor::new("owner", FieldType::Entity).indexed(false))
            .build()
            .unwrap();
        assert!(schema.finders().is_empty());
        assert_eq!(schema.persisted_fields().count(), 0);
    }

    #[test]
    fn test_duplicate_fields_collapse() {
        let schema = EntitySchema::builder("Item", "item")
            .field(FieldDescriptor::new("label", FieldType::String))
            .field(FieldDescriptor::new("label", FieldType::Int))
            .build()
            .unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.fields[0].field_type, FieldType::String);
    }

    #[test]
    fn test_rejects_two_identities() {
        let result = EntitySchema::builder("Item", "item")
            .field(FieldDescriptor::new("id", FieldType::String).property("_id"))
            .field(FieldDescriptor::new("code", FieldType::String).identity())
            .build();
        assert!(matches!(result, Err(DocRepoError::Schema(_))));
    }

    #[test]
    fn test_rejects_empty_type_tag() {
        let result = EntitySchema::builder("Item", "  ").build();
        assert!(matches!(result, Err(DocRepoError::Schema(_))));
    }

    #[test]
    fn test_rejects_non_class_declaration() {
        let def = EntityDefinition {
            name: "Shape".into(),
            kind: DeclarationKind::Interface,
            type_tag: "shape".into(),
            package: None,
            fields: vec![],
            indexes: vec![],
        };
        let err = EntitySchema::from_definition(&def).unwrap_err();
        assert!(err.to_string().contains("only classes"));
    }

    #[test]
    fn test_module_path() {
        assert_eq!(category().module_path(), vec!["shop", "catalog", "proxy"]);
        let bare = EntitySchema::builder("Tag", "tag").build().unwrap();
        assert_eq!(bare.module_path(), vec!["proxy"]);
    }

    #[test]
    fn test_finder_method_name() {
        assert_eq!(finder_method_name(&["firstName"], false), "find_by_first_name");
        assert_eq!(finder_method_name(&["x", "y"], true), "find_one_by_x_and_y");
    }
}
