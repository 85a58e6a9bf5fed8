use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

use super::DocumentStore;
use crate::errors::ApiError;
use crate::json::json_value_to_bson_document;
use crate::query::{Filter, Matcher, UpdateDoc, apply_update};
use crate::types::{Document, InsertResult, UpdateResult};

/// In-process document store.
///
/// Collections are created on first insert and kept in insertion order, which is
/// the order `find` returns. Evaluation uses the same [`Filter`] semantics the
/// Mongo renderer targets, so the service behaves the same on either backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub const SCHEME: &'static str = "memory://";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `memory://` opens an empty store; `memory://<path>` seeds it from a JSON file
    /// shaped `{"<collection>": [<document>, ...], ...}`.
    ///
    /// # Errors
    /// Returns `StoreConnect` when the seed file cannot be read or parsed.
    pub fn from_uri(uri: &str) -> Result<Self, ApiError> {
        let rest = uri.strip_prefix(Self::SCHEME).unwrap_or_default();
        let store = Self::new();
        if !rest.is_empty() {
            store
                .load_seed_file(Path::new(rest))
                .map_err(|e| ApiError::StoreConnect(format!("seed file {rest}: {e}")))?;
        }
        log::info!("Using in-memory store ({} collections)", store.collections.read().len());
        Ok(store)
    }

    /// # Errors
    /// Returns an error when the file is unreadable, not JSON, or not shaped as a
    /// map from collection name to an array of objects.
    pub fn load_seed_file(&self, path: &Path) -> Result<usize, ApiError> {
        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let serde_json::Value::Object(map) = value else {
            return Err(ApiError::Config("seed file must be a JSON object".into()));
        };
        let mut loaded = 0usize;
        for (name, docs) in map {
            let serde_json::Value::Array(items) = docs else {
                return Err(ApiError::Config(format!("seed collection {name} must be an array")));
            };
            let docs = items
                .into_iter()
                .map(json_value_to_bson_document)
                .collect::<Result<Vec<_>, _>>()?;
            loaded += docs.len();
            self.seed(&name, docs);
        }
        Ok(loaded)
    }

    /// Append documents to `collection` as-is, assigning `_id` where missing.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut cols = self.collections.write();
        let col = cols.entry(collection.to_string()).or_default();
        col.extend(docs.into_iter().map(|d| with_id(d).0));
    }

    /// Snapshot of a collection, for inspection.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }
}

/// Ensure the document carries `_id`, placed first like the server does.
fn with_id(doc: Document) -> (Document, Bson) {
    if let Some(id) = doc.get("_id").cloned() {
        return (doc, id);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut out = BsonDocument::new();
    out.insert("_id", id.clone());
    for (k, v) in doc {
        out.insert(k, v);
    }
    (out, id)
}

impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, ApiError> {
        let matcher = Matcher::new(filter);
        let cols = self.collections.read();
        Ok(cols
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matcher.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertResult, ApiError> {
        let (doc, inserted_id) = with_id(doc);
        let mut cols = self.collections.write();
        let col = cols.entry(collection.to_string()).or_default();
        if col.iter().any(|d| d.get("_id") == Some(&inserted_id)) {
            return Err(ApiError::StoreWrite(format!("duplicate key: _id {inserted_id}")));
        }
        col.push(doc);
        Ok(InsertResult { inserted_id })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateResult, ApiError> {
        let matcher = Matcher::new(filter);
        let mut cols = self.collections.write();
        let Some(doc) = cols
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matcher.matches(d)))
        else {
            return Ok(UpdateResult::new(0, 0));
        };
        let mut next = doc.clone();
        let changed = apply_update(&mut next, update)?;
        if next.get("_id") != doc.get("_id") {
            return Err(ApiError::StoreWrite(
                "Performing an update on the path '_id' would modify the immutable field '_id'"
                    .into(),
            ));
        }
        *doc = next;
        Ok(UpdateResult::new(1, u64::from(changed)))
    }
}
