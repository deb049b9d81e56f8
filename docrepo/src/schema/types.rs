use crate::config::EngineConfig;
use crate::error::{DocRepoError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level schema definition parsed from schema.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Name of the generated facade type
    #[serde(default)]
    pub facade: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Entity declarations, in discovery order
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
}

impl SchemaDefinition {
    pub fn facade_name(&self) -> &str {
        self.facade.as_deref().unwrap_or("Database")
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// Declaration of a single persisted entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: DeclarationKind,
    #[serde(rename = "type", default)]
    pub type_tag: String,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

/// What kind of declaration an entity annotation was placed on.
/// Only classes can be mapped to documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    #[default]
    Class,
    Interface,
    Enum,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Class => write!(f, "class"),
            DeclarationKind::Interface => write!(f, "interface"),
            DeclarationKind::Enum => write!(f, "enum"),
            DeclarationKind::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Definition of a single field in an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Store property name; defaults to the field name
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub index: Option<FieldIndex>,
}

/// Index placed directly on a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIndex {
    #[serde(default)]
    pub unique: bool,
}

/// Entity-level index over one or more fields (AND semantics)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDefinition {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    /// Reference to another entity. Accepted in schemas but not persisted.
    Entity,
}

impl FieldType {
    /// Nested entity references are not serialized and never get finders.
    pub fn is_supported(&self) -> bool {
        !matches!(self, FieldType::Entity)
    }

    /// Parse a textual value (CLI arguments, fixtures) into the exact value
    /// variant this field type is stored as.
    pub fn parse_value(&self, field: &str, raw: &str) -> Result<Value> {
        let invalid = |reason: String| DocRepoError::InvalidValue {
            field: field.to_string(),
            reason,
        };
        let value = match self {
            FieldType::Byte => Value::Byte(raw.parse().map_err(|e| invalid(format!("{e}")))?),
            FieldType::Short => Value::Short(raw.parse().map_err(|e| invalid(format!("{e}")))?),
            FieldType::Int => Value::Int(raw.parse().map_err(|e| invalid(format!("{e}")))?),
            FieldType::Long => Value::Long(raw.parse().map_err(|e| invalid(format!("{e}")))?),
            FieldType::Float => Value::Float(raw.parse().map_err(|e| invalid(format!("{e}")))?),
            FieldType::Double => Value::Double(raw.parse().map_err(|e| invalid(format!("{e}")))?),
            FieldType::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(invalid(format!("expected one character, got '{raw}'"))),
                }
            }
            FieldType::String => Value::String(raw.to_string()),
            FieldType::Entity => {
                return Err(invalid("entity references cannot be queried".into()));
            }
        };
        Ok(value)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Char => "char",
            FieldType::String => "string",
            FieldType::Entity => "entity",
        };
        write!(f, "{name}")
    }
}
