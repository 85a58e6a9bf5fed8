//! Generic list/insert/update-by-key over a named collection.

use std::sync::Arc;

use crate::errors::ApiError;
use crate::query::{Filter, SearchQuery, UpdateDoc, parse_int_prefix};
use crate::store::DocumentStore;
use crate::types::{Document, InsertResult, UpdateResult};

pub struct Repository<S> {
    store: Arc<S>,
}

impl<S> Clone for Repository<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: DocumentStore> Repository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every document in `collection`, unfiltered, in store order.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store cannot be read.
    pub async fn list_all(&self, collection: &str) -> Result<Vec<Document>, ApiError> {
        let docs = self.store.find(collection, &Filter::True).await?;
        log::debug!("list {collection}: {} documents", docs.len());
        Ok(docs)
    }

    /// Insert `doc` verbatim. No schema or key-uniqueness check.
    ///
    /// # Errors
    /// `StoreWrite` on any store failure.
    pub async fn insert(&self, collection: &str, doc: Document) -> Result<InsertResult, ApiError> {
        let res = self.store.insert_one(collection, doc).await?;
        log::info!("inserted into {collection}: _id {}", res.inserted_id);
        Ok(res)
    }

    /// Merge `patch` into the first document whose `key_field` equals the integer
    /// prefix of `key_value`.
    ///
    /// A key with no leading digits matches nothing and the store is not called.
    ///
    /// # Errors
    /// `StoreWrite` on any store failure.
    pub async fn update_by_key(
        &self,
        collection: &str,
        key_field: &str,
        key_value: &str,
        patch: Document,
    ) -> Result<UpdateResult, ApiError> {
        let Some(key) = parse_int_prefix(key_value) else {
            log::debug!("update {collection}: key {key_value:?} is not a number");
            return Ok(UpdateResult::new(0, 0));
        };
        let update = UpdateDoc::from_patch(patch);
        let res = self.store.update_one(collection, &Filter::eq(key_field, key), &update).await?;
        log::info!(
            "update {collection} {key_field}={key}: matched {}, modified {}",
            res.matched_count,
            res.modified_count
        );
        Ok(res)
    }

    /// Run a catalog search.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store cannot be read.
    pub async fn search(
        &self,
        collection: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Document>, ApiError> {
        let docs = self.store.find(collection, &query.to_filter()).await?;
        log::debug!(
            "search {collection} term={:?} ({:?}): {} hits",
            query.term(),
            query.kind(),
            docs.len()
        );
        Ok(docs)
    }
}
