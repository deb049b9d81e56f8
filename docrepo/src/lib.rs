pub mod config;
pub mod document;
pub mod dynamic;
pub mod error;
pub mod repository;
pub mod schema;
pub mod store;
pub mod value;

pub use config::{EngineConfig, ViewLifecycle};
pub use document::{Document, Properties};
pub use dynamic::{DynamicEntity, DynamicRepository};
pub use error::{DocRepoError, Result};
pub use repository::{Entity, Predicate, Repository};
pub use schema::{EntitySchema, SchemaDefinition};
pub use store::{DocumentStore, SqliteStore};
pub use value::Value;
