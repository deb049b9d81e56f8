//! Generic repository behaviour shared by every entity.
//!
//! The store only offers single-key views. [`Repository`] emulates arbitrary
//! AND-of-equalities lookups on top of that: each predicate query registers a
//! throwaway view whose map function emits documents matching every pair,
//! then re-reads each candidate document and checks the predicate again
//! against its live properties. The view is only trusted to discover
//! candidates, never to decide a match.

mod predicate;

pub use predicate::Predicate;

use crate::config::{EngineConfig, ViewLifecycle};
use crate::document::{Document, Properties, NATIVE_ID_PROPERTY};
use crate::error::Result;
use crate::store::DocumentStore;
use crate::value::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Version of the map function registered for type views.
const TYPE_VIEW_VERSION: &str = "1";

/// A value that can be persisted as a document.
///
/// Generated accessors implement this trait; the implementation maps each
/// declared field to its store property.
pub trait Entity: Sized {
    /// Id of the backing document, if the entity has one.
    fn document_id(&self) -> Option<String>;

    /// Properties to store for this entity, without the discriminator.
    fn serialize(&self) -> Properties;

    /// Build a fresh entity from a stored document.
    fn unserialize(document: &Document) -> Self;
}

/// CRUD and predicate finders for one entity type, bound to one store.
pub struct Repository<E> {
    store: Arc<dyn DocumentStore>,
    type_tag: String,
    type_view: String,
    config: EngineConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn DocumentStore>, type_tag: impl Into<String>) -> Self {
        Self::with_config(store, type_tag, EngineConfig::default())
    }

    /// Create a repository and register its type view.
    ///
    /// A failure to register the view is logged; `find_all` then reports it
    /// when it queries the view.
    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        type_tag: impl Into<String>,
        config: EngineConfig,
    ) -> Self {
        let type_tag = type_tag.into();
        let type_view = type_view_name(&type_tag, &config.discriminator);
        let repository = Repository {
            store,
            type_tag,
            type_view,
            config,
            _entity: PhantomData,
        };
        if let Err(e) = repository.register_type_view() {
            log::warn!(
                "Failed to register view '{}': {e}",
                repository.type_view
            );
        }
        repository
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn register_type_view(&self) -> Result<()> {
        let discriminator = self.config.discriminator.clone();
        let tag = Value::String(self.type_tag.clone());
        self.store
            .get_or_create_view(&self.type_view)
            .set_map_function(
                move |doc: &Document| {
                    if doc.matches(&discriminator, &tag) {
                        Some((tag.clone(), id_value(&doc.id)))
                    } else {
                        None
                    }
                },
                TYPE_VIEW_VERSION,
            )
    }

    // ── Strict API ─────────────────────────────────────────────────

    /// Read the document with `id`. The discriminator is not checked: any
    /// document with that id is unserialized as `E`.
    pub fn try_find_one_by_id(&self, id: &str) -> Result<Option<E>> {
        Ok(self.store.get_document(id)?.map(|doc| E::unserialize(&doc)))
    }

    /// Every document whose discriminator holds this repository's type tag,
    /// in view order.
    pub fn try_find_all(&self) -> Result<Vec<E>> {
        let rows = self.store.get_or_create_view(&self.type_view).query()?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match self.store.get_document(&row.document_id)? {
                Some(doc) => items.push(E::unserialize(&doc)),
                None => log::debug!("Row for vanished document '{}' skipped", row.document_id),
            }
        }
        Ok(items)
    }

    /// Entities whose properties equal every pair of `predicate`.
    pub fn try_find_by(&self, predicate: &Predicate) -> Result<Vec<E>> {
        let view_name = self.ephemeral_view_name();
        let view = self.store.get_or_create_view(&view_name);

        let pairs = predicate.clone();
        let version = view_name.clone();
        view.set_map_function(
            move |doc: &Document| {
                let matched = pairs.iter().filter(|(k, v)| doc.matches(k, v)).count();
                if matched == pairs.len() {
                    Some((pairs.composite_key(), id_value(&doc.id)))
                } else {
                    None
                }
            },
            &version,
        )?;

        let rows = view.query();
        if self.config.view_lifecycle == ViewLifecycle::Drop {
            if let Err(e) = self.store.delete_view(&view_name) {
                log::warn!("Failed to drop view '{view_name}': {e}");
            }
        }

        let mut items = Vec::new();
        for row in rows? {
            // The view index may lag behind the live document
            let Some(doc) = self.store.get_document(&row.document_id)? else {
                continue;
            };
            if predicate.validate(&doc) {
                items.push(E::unserialize(&doc));
            } else {
                log::debug!("Stale row for '{}' discarded", doc.id);
            }
        }
        Ok(items)
    }

    /// First entity matching `predicate`, in view order. Uniqueness is not
    /// enforced here.
    pub fn try_find_one_by(&self, predicate: &Predicate) -> Result<Option<E>> {
        Ok(self.try_find_by(predicate)?.into_iter().next())
    }

    /// Write `entity` and return it as read back from the store.
    ///
    /// An entity without an id, or whose id has no document yet, gets a new
    /// document: store-assigned id in the first case, the entity's own id in
    /// the second.
    pub fn try_save(&self, entity: &E) -> Result<E> {
        let mut document = self.document_for(entity)?;
        self.write(&mut document, entity)?;
        let stored = self.store.get_document(&document.id)?.unwrap_or(document);
        Ok(E::unserialize(&stored))
    }

    /// Delete the entity's document. `Ok(false)` when there is nothing to
    /// delete; the store is not touched in that case.
    pub fn try_delete(&self, entity: &E) -> Result<bool> {
        let Some(id) = entity.document_id() else {
            return Ok(false);
        };
        let Some(document) = self.store.get_document(&id)? else {
            return Ok(false);
        };
        self.store.delete_document(&document)?;
        Ok(true)
    }

    fn document_for(&self, entity: &E) -> Result<Document> {
        match entity.document_id() {
            Some(id) => Ok(self
                .store
                .get_document(&id)?
                .unwrap_or_else(|| Document::new(id))),
            None => Ok(self.store.create_document()),
        }
    }

    fn write(&self, document: &mut Document, entity: &E) -> Result<()> {
        let mut properties = entity.serialize();
        properties.insert(
            self.config.discriminator.clone(),
            Value::String(self.type_tag.clone()),
        );
        self.store.put_properties(document, properties)
    }

    fn ephemeral_view_name(&self) -> String {
        format!(
            "view.{}.{}",
            self.type_tag,
            uuid::Uuid::new_v4().simple()
        )
    }

    // ── Compatibility API ──────────────────────────────────────────
    //
    // Store failures are logged and collapsed into an empty result, `None`
    // or `false`, so callers cannot tell "no match" from "store failed".

    pub fn find_one_by_id(&self, id: &str) -> Option<E> {
        self.collapse("find_one_by_id", self.try_find_one_by_id(id))
            .flatten()
    }

    pub fn find_all(&self) -> Vec<E> {
        self.collapse("find_all", self.try_find_all())
            .unwrap_or_default()
    }

    pub fn find_by(&self, field: &str, value: impl Into<Value>) -> Vec<E> {
        self.find_by_predicate(&Predicate::single(field, value))
    }

    pub fn find_by_predicate(&self, predicate: &Predicate) -> Vec<E> {
        self.collapse("find_by", self.try_find_by(predicate))
            .unwrap_or_default()
    }

    pub fn find_one_by(&self, field: &str, value: impl Into<Value>) -> Option<E> {
        self.find_one_by_predicate(&Predicate::single(field, value))
    }

    pub fn find_one_by_predicate(&self, predicate: &Predicate) -> Option<E> {
        self.collapse("find_one_by", self.try_find_one_by(predicate))
            .flatten()
    }

    /// Save and return the stored entity. If the write fails, the entity is
    /// rebuilt from the unwritten document handle instead.
    ///
    /// When the existing document cannot be read nothing is written: a new
    /// document would duplicate the entity under another id.
    pub fn save(&self, entity: &E) -> E {
        let mut document = match self.document_for(entity) {
            Ok(doc) => doc,
            Err(e) => {
                self.log_collapsed("save", &e);
                let id = entity.document_id().unwrap_or_default();
                return E::unserialize(&Document::new(id));
            }
        };
        if let Err(e) = self.write(&mut document, entity) {
            self.log_collapsed("save", &e);
            return E::unserialize(&document);
        }
        match self.store.get_document(&document.id) {
            Ok(Some(stored)) => E::unserialize(&stored),
            Ok(None) => E::unserialize(&document),
            Err(e) => {
                self.log_collapsed("save", &e);
                E::unserialize(&document)
            }
        }
    }

    pub fn delete(&self, entity: &E) -> bool {
        self.collapse("delete", self.try_delete(entity))
            .unwrap_or(false)
    }

    fn collapse<T>(&self, operation: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_collapsed(operation, &e);
                None
            }
        }
    }

    fn log_collapsed(&self, operation: &str, error: &crate::DocRepoError) {
        log::warn!("{operation} on '{}' failed: {error}", self.type_tag);
    }
}

/// Name of the persistent view listing every document of a type.
pub fn type_view_name(type_tag: &str, discriminator: &str) -> String {
    format!("view.{type_tag}.{discriminator}")
}

fn id_value(id: &str) -> Value {
    let mut value = BTreeMap::new();
    value.insert(NATIVE_ID_PROPERTY.to_string(), Value::String(id.to_string()));
    Value::Map(value)
}
