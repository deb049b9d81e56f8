//! Store adapter contract.
//!
//! The query engine only needs a handful of primitives from the underlying
//! document store: read, create, write and delete a document by id, register
//! a named view with a map function, and run a view query. [`DocumentStore`]
//! captures exactly that. [`SqliteStore`] is the adapter shipped with this
//! crate.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::document::{Document, Properties};
use crate::error::Result;
use crate::value::Value;
use std::sync::Arc;

/// Map function of a view: inspects one document and optionally emits a
/// single `(key, value)` row for it.
pub type MapFn = Arc<dyn Fn(&Document) -> Option<(Value, Value)> + Send + Sync>;

/// One row returned by a view query.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub key: Value,
    pub value: Value,
    /// Id of the document that emitted this row
    pub document_id: String,
}

/// Primitive operations of an embedded document store.
///
/// Implementations must be shareable: one store handle backs every
/// repository of a facade.
pub trait DocumentStore: Send + Sync {
    /// Read a document by id. `Ok(None)` if it does not exist.
    fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// A fresh, empty document with a store-assigned id. Nothing is written
    /// until the first [`put_properties`](Self::put_properties).
    fn create_document(&self) -> Document;

    /// Replace all properties of `document` and persist it.
    fn put_properties(&self, document: &mut Document, properties: Properties) -> Result<()>;

    fn delete_document(&self, document: &Document) -> Result<()>;

    /// Register or replace the map function of a view. A version different
    /// from the one last registered discards the view's existing index.
    fn set_map_function(&self, view: &str, map: MapFn, version: &str) -> Result<()>;

    /// Run a view query, returning rows in key order.
    fn query_view(&self, view: &str) -> Result<Vec<ViewRow>>;

    /// Remove a view and its index.
    fn delete_view(&self, view: &str) -> Result<()>;

    /// Names of every view currently registered in the store.
    fn view_names(&self) -> Result<Vec<String>>;
}

/// Handle on a named view of a store.
pub struct ViewHandle<'a> {
    store: &'a dyn DocumentStore,
    name: String,
}

impl<'a> ViewHandle<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_map_function<F>(&self, map: F, version: &str) -> Result<()>
    where
        F: Fn(&Document) -> Option<(Value, Value)> + Send + Sync + 'static,
    {
        self.store.set_map_function(&self.name, Arc::new(map), version)
    }

    pub fn query(&self) -> Result<Vec<ViewRow>> {
        self.store.query_view(&self.name)
    }

    pub fn delete(self) -> Result<()> {
        self.store.delete_view(&self.name)
    }
}

impl<'s> dyn DocumentStore + 's {
    /// Get a handle on the view called `name`. The view itself is created
    /// when a map function is first set.
    pub fn get_or_create_view(&self, name: &str) -> ViewHandle<'_> {
        ViewHandle {
            store: self,
            name: name.to_string(),
        }
    }
}
