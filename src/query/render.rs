use bson::{Bson, Document as BsonDocument, doc};

use super::types::{Filter, UpdateDoc};

fn options(case_insensitive: bool) -> &'static str {
    if case_insensitive { "i" } else { "" }
}

/// Render a [`Filter`] as a MongoDB query document.
///
/// `TextOf` becomes an aggregation expression: the field is converted with
/// `$convert` (non-convertible values turn into an empty string instead of
/// failing the query) and tested with `$regexMatch`.
#[must_use]
pub fn to_mongo_filter(filter: &Filter) -> BsonDocument {
    match filter {
        Filter::True => BsonDocument::new(),
        Filter::And(fs) if fs.is_empty() => BsonDocument::new(),
        Filter::Or(fs) if fs.is_empty() => doc! {"$expr": false},
        Filter::And(fs) => doc! {"$and": render_all(fs)},
        Filter::Or(fs) => doc! {"$or": render_all(fs)},
        Filter::Eq { path, value } => {
            let mut d = BsonDocument::new();
            d.insert(path.clone(), value.clone());
            d
        }
        Filter::Regex { path, pattern, case_insensitive } => {
            let opts = options(*case_insensitive);
            let mut d = BsonDocument::new();
            d.insert(path.clone(), doc! {"$regex": pattern.as_str(), "$options": opts});
            d
        }
        Filter::TextOf { path, pattern, case_insensitive } => {
            let field_ref = format!("${path}");
            let opts = options(*case_insensitive);
            let converted = doc! {
                "$convert": {"input": field_ref, "to": "string", "onError": "", "onNull": ""}
            };
            doc! {
                "$expr": {
                    "$regexMatch": {"input": converted, "regex": pattern.as_str(), "options": opts}
                }
            }
        }
    }
}

fn render_all(fs: &[Filter]) -> Vec<Bson> {
    fs.iter().map(|f| Bson::Document(to_mongo_filter(f))).collect()
}

/// Render an [`UpdateDoc`] as a MongoDB update document (`{"$set": {...}}`).
#[must_use]
pub fn to_mongo_update(update: &UpdateDoc) -> BsonDocument {
    let mut set = BsonDocument::new();
    for (k, v) in &update.set {
        set.insert(k.clone(), v.clone());
    }
    doc! {"$set": set}
}
