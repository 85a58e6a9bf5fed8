use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

/// Collection-level document as stored. The service treats documents as open maps.
pub type Document = BsonDocument;

/// Natural key field of the catalog collection.
pub const PROGRAM_KEY: &str = "id";
/// Natural key field of the orders collection.
pub const ORDER_KEY: &str = "orderNo";

/// Outcome of `insert_one`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    pub inserted_id: Bson,
}

/// Outcome of `update_one`. `matched == 0` means no document carried the key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateResult {
    #[must_use]
    pub const fn new(matched_count: u64, modified_count: u64) -> Self {
        Self { acknowledged: true, matched_count, modified_count }
    }

    #[must_use]
    pub const fn is_miss(&self) -> bool {
        self.matched_count == 0
    }
}
