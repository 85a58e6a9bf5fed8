//! Conversions between request/response JSON and BSON documents.

use bson::{Bson, Document as BsonDocument};
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::types::{InsertResult, UpdateResult};

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
///
/// # Errors
/// Returns `InvalidQuery` if the value is not an object, `Bson` if a value cannot be represented.
pub fn json_value_to_bson_document(val: Value) -> Result<BsonDocument, ApiError> {
    match val {
        Value::Object(obj) => Ok(BsonDocument::try_from(obj)?),
        other => Err(ApiError::InvalidQuery(format!(
            "expected JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parse a JSON string into a `bson::Document`. The JSON must be a top-level object.
///
/// # Errors
/// See [`json_value_to_bson_document`]; malformed JSON yields `Json`.
pub fn parse_json_to_bson_document(json: &str) -> Result<BsonDocument, ApiError> {
    let val: Value = serde_json::from_str(json)?;
    json_value_to_bson_document(val)
}

const fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a BSON value the way a JavaScript client expects it: object ids as hex
/// strings, dates as RFC 3339, everything else as relaxed extended JSON.
#[must_use]
pub fn bson_to_json(v: Bson) -> Value {
    match v {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map_or_else(|_| Value::from(dt.timestamp_millis()), Value::String),
        Bson::Decimal128(d) => Value::String(d.to_string()),
        Bson::Document(d) => document_to_json(d),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

#[must_use]
pub fn document_to_json(doc: BsonDocument) -> Value {
    let mut out = Map::with_capacity(doc.len());
    for (k, v) in doc {
        out.insert(k, bson_to_json(v));
    }
    Value::Object(out)
}

#[must_use]
pub fn documents_to_json(docs: Vec<BsonDocument>) -> Value {
    Value::Array(docs.into_iter().map(document_to_json).collect())
}

#[must_use]
pub fn insert_result_to_json(res: InsertResult) -> Value {
    serde_json::json!({
        "acknowledged": true,
        "insertedId": bson_to_json(res.inserted_id),
    })
}

/// Update results serialize directly; the 404 variant carries an extra `error` field.
#[must_use]
pub fn update_result_to_json(res: UpdateResult, error: Option<&str>) -> Value {
    let mut v = serde_json::to_value(res).unwrap_or_else(|_| Value::Object(Map::new()));
    if let (Some(msg), Value::Object(map)) = (error, &mut v) {
        map.insert("error".to_string(), Value::String(msg.to_string()));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn json_to_bson_success() {
        let d = parse_json_to_bson_document("{\"a\":1,\"b\":\"x\",\"c\":2.5}").unwrap();
        assert_eq!(d.get_i32("a").unwrap(), 1);
        assert_eq!(d.get_str("b").unwrap(), "x");
        assert_eq!(d.get_f64("c").unwrap(), 2.5);
    }

    #[test]
    fn json_to_bson_rejects_array() {
        let e = parse_json_to_bson_document("[1,2,3]").unwrap_err();
        assert!(matches!(e, ApiError::InvalidQuery(_)));
    }

    #[test]
    fn object_ids_render_as_hex() {
        let oid = ObjectId::new();
        let v = document_to_json(bson::doc! {"_id": oid, "n": 3_i32});
        assert_eq!(v["_id"], Value::String(oid.to_hex()));
        assert_eq!(v["n"], Value::from(3));
    }

    #[test]
    fn not_found_update_body_keeps_counts() {
        let v = update_result_to_json(UpdateResult::new(0, 0), Some("Order not found"));
        assert_eq!(v["matchedCount"], Value::from(0));
        assert_eq!(v["modifiedCount"], Value::from(0));
        assert_eq!(v["error"], Value::from("Order not found"));
    }
}
