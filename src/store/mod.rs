//! Document store access.
//!
//! [`DocumentStore`] is the capability set the service needs from a store:
//! `find`, `insert_one` and `update_one` against a named collection. Two
//! backends implement it: [`MongoStore`] over the official driver and
//! [`MemoryStore`], an in-process store used for development and tests.
//! [`connect`] picks the backend from the URI scheme and is called once at boot.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::future::Future;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::errors::ApiError;
use crate::query::{Filter, UpdateDoc};
use crate::types::{Document, InsertResult, UpdateResult};

pub trait DocumentStore: Send + Sync + 'static {
    /// All documents of `collection` matching `filter`, in store order.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Document>, ApiError>> + Send;

    /// Insert `doc` as given. The store assigns `_id` when the document has none.
    fn insert_one(
        &self,
        collection: &str,
        doc: Document,
    ) -> impl Future<Output = Result<InsertResult, ApiError>> + Send;

    /// Apply `update` to the first document matching `filter`.
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> impl Future<Output = Result<UpdateResult, ApiError>> + Send;
}

/// Backend selected by the connection URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

impl StoreKind {
    /// # Errors
    /// Returns `StoreConnect` for schemes no backend understands.
    pub fn from_uri(uri: &str) -> Result<Self, ApiError> {
        if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
            Ok(Self::Mongo)
        } else if uri.starts_with(MemoryStore::SCHEME) {
            Ok(Self::Memory)
        } else {
            Err(ApiError::StoreConnect(format!("unsupported store URI scheme: {}", redact(uri))))
        }
    }
}

/// Connected store handle, shared by every request for the process lifetime.
pub enum AnyStore {
    Mongo(MongoStore),
    Memory(MemoryStore),
}

impl DocumentStore for AnyStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, ApiError> {
        match self {
            Self::Mongo(s) => s.find(collection, filter).await,
            Self::Memory(s) => s.find(collection, filter).await,
        }
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertResult, ApiError> {
        match self {
            Self::Mongo(s) => s.insert_one(collection, doc).await,
            Self::Memory(s) => s.insert_one(collection, doc).await,
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateResult, ApiError> {
        match self {
            Self::Mongo(s) => s.update_one(collection, filter, update).await,
            Self::Memory(s) => s.update_one(collection, filter, update).await,
        }
    }
}

/// Establish the store connection, retrying up to `connect_attempts` times.
///
/// # Errors
/// Returns `StoreConnect` once every attempt has failed, or `Config` when no URI can be built.
pub async fn connect(cfg: &StoreConfig) -> Result<AnyStore, ApiError> {
    let uri = cfg.connection_uri()?;
    let kind = StoreKind::from_uri(&uri)?;
    let attempts = cfg.connect_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        let res = match kind {
            StoreKind::Mongo => MongoStore::connect(&uri, &cfg.database).await.map(AnyStore::Mongo),
            StoreKind::Memory => MemoryStore::from_uri(&uri).map(AnyStore::Memory),
        };
        match res {
            Ok(store) => return Ok(store),
            Err(e) => {
                log::warn!("store connect attempt {attempt}/{attempts} failed: {e}");
                last_err = Some(e);
                if attempt < attempts {
                    let backoff = cfg.connect_backoff_ms.saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ApiError::StoreConnect("no connect attempt made".into())))
}

/// Hide credentials in a connection string before it reaches a log line.
#[must_use]
pub fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}
