use super::{DocumentStore, MapFn, ViewRow};
use crate::document::{Document, Properties};
use crate::error::{DocRepoError, Result};
use crate::value::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Embedded document store backed by SQLite.
///
/// Documents are kept as JSON property maps. Every write bumps a global
/// sequence number; views are indexed lazily at query time by re-running
/// their map function over documents changed since the view's last indexed
/// sequence. Map functions are closures and therefore live only in this
/// process, while view indexes persist in the database file.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Connection,
    maps: HashMap<String, MapFn>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        initialize_tables(&conn)?;
        Ok(SqliteStore {
            inner: Mutex::new(Inner {
                conn,
                maps: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| DocRepoError::Store("store lock poisoned".into()))
    }

    /// Sequence number of the latest write. Unchanged sequence means no
    /// document was mutated.
    pub fn last_sequence(&self) -> Result<i64> {
        let inner = self.lock()?;
        current_sequence(&inner.conn)
    }

    /// Number of live documents.
    pub fn document_count(&self) -> Result<usize> {
        let inner = self.lock()?;
        let count: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE deleted = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every live document, in creation order.
    pub fn all_documents(&self) -> Result<Vec<Document>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT id, properties_json FROM documents WHERE deleted = 0 ORDER BY created",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut docs = Vec::new();
        for row in rows {
            let (id, json) = row?;
            docs.push(Document::with_properties(id, serde_json::from_str(&json)?));
        }
        Ok(docs)
    }
}

fn initialize_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            created INTEGER NOT NULL,
            properties_json TEXT NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_documents_seq ON documents(seq);

        CREATE TABLE IF NOT EXISTS views (
            name TEXT PRIMARY KEY,
            version TEXT NOT NULL,
            last_seq INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS view_rows (
            view_name TEXT NOT NULL,
            document_id TEXT NOT NULL,
            key_json TEXT NOT NULL,
            value_json TEXT NOT NULL,
            PRIMARY KEY (view_name, document_id)
        );
        ",
    )?;
    Ok(())
}

fn current_sequence(conn: &Connection) -> Result<i64> {
    let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM documents", [], |row| {
        row.get(0)
    })?;
    Ok(seq)
}

impl DocumentStore for SqliteStore {
    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let inner = self.lock()?;
        let json: Option<String> = inner
            .conn
            .query_row(
                "SELECT properties_json FROM documents WHERE id = ?1 AND deleted = 0",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(Document::with_properties(id, serde_json::from_str(&json)?))),
            None => Ok(None),
        }
    }

    fn create_document(&self) -> Document {
        Document::new(uuid::Uuid::new_v4().to_string())
    }

    fn put_properties(&self, document: &mut Document, properties: Properties) -> Result<()> {
        // JSON would store these as null, which no longer reads back
        if let Some((name, _)) = properties.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DocRepoError::InvalidValue {
                field: name.clone(),
                reason: "NaN and infinite numbers cannot be stored".into(),
            });
        }
        let inner = self.lock()?;
        let json = serde_json::to_string(&properties)?;
        let seq = current_sequence(&inner.conn)? + 1;
        inner.conn.execute(
            "INSERT INTO documents (id, seq, created, properties_json, deleted)
             VALUES (?1, ?2, ?2, ?3, 0)
             ON CONFLICT(id) DO UPDATE SET
                seq = excluded.seq,
                properties_json = excluded.properties_json,
                deleted = 0",
            params![document.id, seq, json],
        )?;
        document.properties = properties;
        Ok(())
    }

    fn delete_document(&self, document: &Document) -> Result<()> {
        let inner = self.lock()?;
        let seq = current_sequence(&inner.conn)? + 1;
        let changed = inner.conn.execute(
            "UPDATE documents SET deleted = 1, seq = ?1, properties_json = '{}'
             WHERE id = ?2 AND deleted = 0",
            params![seq, document.id],
        )?;
        if changed == 0 {
            return Err(DocRepoError::NotFound {
                id: document.id.clone(),
            });
        }
        Ok(())
    }

    fn set_map_function(&self, view: &str, map: MapFn, version: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let stored: Option<String> = inner
            .conn
            .query_row(
                "SELECT version FROM views WHERE name = ?1",
                params![view],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(v) if v == version => {}
            Some(_) => {
                log::debug!("View '{view}' changed version, discarding its index");
                inner
                    .conn
                    .execute("DELETE FROM view_rows WHERE view_name = ?1", params![view])?;
                inner.conn.execute(
                    "UPDATE views SET version = ?2, last_seq = 0 WHERE name = ?1",
                    params![view, version],
                )?;
            }
            None => {
                inner.conn.execute(
                    "INSERT INTO views (name, version, last_seq) VALUES (?1, ?2, 0)",
                    params![view, version],
                )?;
            }
        }

        inner.maps.insert(view.to_string(), map);
        Ok(())
    }

    fn query_view(&self, view: &str) -> Result<Vec<ViewRow>> {
        let mut inner = self.lock()?;
        let map = inner
            .maps
            .get(view)
            .cloned()
            .ok_or_else(|| DocRepoError::Store(format!("View '{view}' has no map function")))?;

        let tx = inner.conn.transaction()?;
        let last_seq: i64 = tx
            .query_row(
                "SELECT last_seq FROM views WHERE name = ?1",
                params![view],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DocRepoError::Store(format!("View '{view}' does not exist")))?;

        // Bring the index up to date with documents written since the last query
        let changed: Vec<(String, i64, String, bool)> = {
            let mut stmt = tx.prepare(
                "SELECT id, seq, properties_json, deleted FROM documents
                 WHERE seq > ?1 ORDER BY seq",
            )?;
            let rows = stmt.query_map(params![last_seq], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get::<_, i64>(3)? != 0))
            })?;
            let changed = rows.collect::<std::result::Result<_, _>>()?;
            changed
        };

        let mut max_seq = last_seq;
        for (id, seq, json, deleted) in changed {
            max_seq = max_seq.max(seq);
            tx.execute(
                "DELETE FROM view_rows WHERE view_name = ?1 AND document_id = ?2",
                params![view, id],
            )?;
            if deleted {
                continue;
            }
            let document = Document::with_properties(id, serde_json::from_str(&json)?);
            if let Some((key, value)) = map(&document) {
                tx.execute(
                    "INSERT INTO view_rows (view_name, document_id, key_json, value_json)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        view,
                        document.id,
                        serde_json::to_string(&key)?,
                        serde_json::to_string(&value)?
                    ],
                )?;
            }
        }
        tx.execute(
            "UPDATE views SET last_seq = ?2 WHERE name = ?1",
            params![view, max_seq],
        )?;

        let mut rows: Vec<(ViewRow, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT r.document_id, r.key_json, r.value_json, d.created
                 FROM view_rows r JOIN documents d ON d.id = r.document_id
                 WHERE r.view_name = ?1",
            )?;
            let raw = stmt.query_map(params![view], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            let mut rows = Vec::new();
            for entry in raw {
                let (document_id, key_json, value_json, created) = entry?;
                let key: Value = serde_json::from_str(&key_json)?;
                let value: Value = serde_json::from_str(&value_json)?;
                rows.push((
                    ViewRow {
                        key,
                        value,
                        document_id,
                    },
                    created,
                ));
            }
            rows
        };
        tx.commit()?;

        rows.sort_by(|(a, ca), (b, cb)| a.key.collate(&b.key).then(ca.cmp(cb)));
        Ok(rows.into_iter().map(|(row, _)| row).collect())
    }

    fn delete_view(&self, view: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .conn
            .execute("DELETE FROM view_rows WHERE view_name = ?1", params![view])?;
        inner
            .conn
            .execute("DELETE FROM views WHERE name = ?1", params![view])?;
        inner.maps.remove(view);
        Ok(())
    }

    fn view_names(&self) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare("SELECT name FROM views ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn by_kind(kind: &'static str) -> MapFn {
        Arc::new(move |doc: &Document| {
            if doc.matches("kind", &Value::from(kind)) {
                Some((Value::from(kind), Value::from(doc.id.as_str())))
            } else {
                None
            }
        })
    }

    #[test]
    fn test_put_and_get_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut doc = store.create_document();
        assert!(store.get_document(&doc.id).unwrap().is_none());

        store
            .put_properties(&mut doc, props(&[("n", Value::Int(1))]))
            .unwrap();
        let loaded = store.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.property("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_put_replaces_properties() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut doc = Document::new("fixed");
        store
            .put_properties(&mut doc, props(&[("a", Value::Int(1))]))
            .unwrap();
        store
            .put_properties(&mut doc, props(&[("b", Value::Int(2))]))
            .unwrap();
        let loaded = store.get_document("fixed").unwrap().unwrap();
        assert_eq!(loaded.property("a"), None);
        assert_eq!(loaded.property("b"), Some(&Value::Int(2)));
        assert_eq!(store.document_count().unwrap(), 1);
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_map_function("by_kind", by_kind("a"), "1").unwrap();
        let mut keep = Document::new("keep");
        store
            .put_properties(&mut keep, props(&[("kind", Value::from("a"))]))
            .unwrap();

        for bad in [Value::Float(f32::NAN), Value::Double(f64::INFINITY)] {
            let mut doc = Document::new("bad");
            let err = store
                .put_properties(&mut doc, props(&[("kind", Value::from("a")), ("w", bad)]))
                .unwrap_err();
            assert!(matches!(err, DocRepoError::InvalidValue { ref field, .. } if field == "w"));
            assert!(doc.properties.is_empty());
        }
        let nested = Value::List(vec![Value::Double(f64::NEG_INFINITY)]);
        assert!(store
            .put_properties(&mut Document::new("bad"), props(&[("ws", nested)]))
            .is_err());

        // Nothing was written, so the store stays readable and queryable
        assert!(store.get_document("bad").unwrap().is_none());
        let rows = store.query_view("by_kind").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].document_id, "keep");
    }

    #[test]
    fn test_delete_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut doc = store.create_document();
        store.put_properties(&mut doc, Properties::new()).unwrap();
        store.delete_document(&doc).unwrap();
        assert!(store.get_document(&doc.id).unwrap().is_none());
        assert!(matches!(
            store.delete_document(&doc),
            Err(DocRepoError::NotFound { .. })
        ));
    }

    #[test]
    fn test_view_tracks_writes_and_deletes() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_map_function("by_kind", by_kind("a"), "1").unwrap();

        let mut first = Document::new("d1");
        store
            .put_properties(&mut first, props(&[("kind", Value::from("a"))]))
            .unwrap();
        let mut second = Document::new("d2");
        store
            .put_properties(&mut second, props(&[("kind", Value::from("b"))]))
            .unwrap();

        let rows = store.query_view("by_kind").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].document_id, "d1");

        store
            .put_properties(&mut second, props(&[("kind", Value::from("a"))]))
            .unwrap();
        store.delete_document(&first).unwrap();

        let rows = store.query_view("by_kind").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["d2"]);
    }

    #[test]
    fn test_rows_sorted_by_key_then_creation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let map: MapFn = Arc::new(|doc: &Document| {
            doc.property("rank")
                .map(|rank| (rank.clone(), Value::Null))
        });
        store.set_map_function("by_rank", map, "1").unwrap();

        for (id, rank) in [("z", 2), ("y", 1), ("x", 2)] {
            let mut doc = Document::new(id);
            store
                .put_properties(&mut doc, props(&[("rank", Value::Int(rank))]))
                .unwrap();
        }

        let ids: Vec<String> = store
            .query_view("by_rank")
            .unwrap()
            .into_iter()
            .map(|r| r.document_id)
            .collect();
        assert_eq!(ids, vec!["y", "z", "x"]);
    }

    #[test]
    fn test_version_change_reindexes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut doc = Document::new("d1");
        store
            .put_properties(&mut doc, props(&[("kind", Value::from("b"))]))
            .unwrap();

        store.set_map_function("v", by_kind("a"), "1").unwrap();
        assert!(store.query_view("v").unwrap().is_empty());

        store.set_map_function("v", by_kind("b"), "2").unwrap();
        assert_eq!(store.query_view("v").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_view() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_map_function("tmp", by_kind("a"), "1").unwrap();
        assert_eq!(store.view_names().unwrap(), vec!["tmp".to_string()]);

        store.delete_view("tmp").unwrap();
        assert!(store.view_names().unwrap().is_empty());
        assert!(store.query_view("tmp").is_err());
    }

    #[test]
    fn test_view_handle() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let view = store.get_or_create_view("all");
        view.set_map_function(|doc| Some((Value::from(doc.id.as_str()), Value::Null)), "1")
            .unwrap();
        let mut doc = store.create_document();
        store.put_properties(&mut doc, Properties::new()).unwrap();
        assert_eq!(view.query().unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let mut doc = Document::new("keep");
            store
                .put_properties(&mut doc, props(&[("s", Value::from("x"))]))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let doc = store.get_document("keep").unwrap().unwrap();
        assert_eq!(doc.property("s"), Some(&Value::from("x")));
    }
}
