use bson::doc;
use mongodb::{Client, Collection, Database};

use super::DocumentStore;
use crate::errors::ApiError;
use crate::query::{Filter, UpdateDoc, to_mongo_filter, to_mongo_update};
use crate::types::{Document, InsertResult, UpdateResult};

/// MongoDB-backed store. Cloning shares the driver's connection pool.
#[derive(Clone, Debug)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and verify reachability with a `ping`.
    ///
    /// # Errors
    /// Returns `StoreConnect` if the URI is invalid or the deployment does not answer.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ApiError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| ApiError::StoreConnect(format!("invalid connection string: {e}")))?;
        let db = client.database(database);
        db.run_command(doc! {"ping": 1})
            .await
            .map_err(|e| ApiError::StoreConnect(format!("ping failed: {e}")))?;
        log::info!("Connected to MongoDB ({}), database {database}", super::redact(uri));
        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, ApiError> {
        let native = to_mongo_filter(filter);
        log::debug!("find {collection} {native}");
        let mut cursor = self
            .collection(collection)
            .find(native)
            .await
            .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?;
        let mut out = Vec::new();
        while cursor.advance().await.map_err(|e| ApiError::StoreUnavailable(e.to_string()))? {
            out.push(
                cursor
                    .deserialize_current()
                    .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?,
            );
        }
        Ok(out)
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertResult, ApiError> {
        let res = self
            .collection(collection)
            .insert_one(doc)
            .await
            .map_err(|e| ApiError::StoreWrite(e.to_string()))?;
        Ok(InsertResult { inserted_id: res.inserted_id })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateResult, ApiError> {
        let res = self
            .collection(collection)
            .update_one(to_mongo_filter(filter), to_mongo_update(update))
            .await
            .map_err(|e| ApiError::StoreWrite(e.to_string()))?;
        Ok(UpdateResult::new(res.matched_count, res.modified_count))
    }
}
