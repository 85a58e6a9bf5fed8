use bson::{Bson, Document as BsonDocument};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use super::types::{Filter, MAX_PATH_DEPTH, UpdateDoc};
use crate::errors::ApiError;

/// A [`Filter`] with its patterns compiled, for matching many documents.
///
/// A pattern that does not compile matches nothing.
#[derive(Debug)]
pub struct Matcher<'f> {
    root: Node<'f>,
}

#[derive(Debug)]
enum Node<'f> {
    True,
    And(Vec<Node<'f>>),
    Or(Vec<Node<'f>>),
    Eq { path: &'f str, value: &'f Bson },
    Regex { path: &'f str, re: Option<Regex>, text_of: bool },
}

impl<'f> Matcher<'f> {
    #[must_use]
    pub fn new(filter: &'f Filter) -> Self {
        Self { root: compile(filter) }
    }

    #[must_use]
    pub fn matches(&self, doc: &BsonDocument) -> bool {
        self.root.matches(doc)
    }
}

fn build(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(case_insensitive).build().ok()
}

fn compile(filter: &Filter) -> Node<'_> {
    match filter {
        Filter::True => Node::True,
        Filter::And(fs) => Node::And(fs.iter().map(compile).collect()),
        Filter::Or(fs) => Node::Or(fs.iter().map(compile).collect()),
        Filter::Eq { path, value } => Node::Eq { path, value },
        Filter::Regex { path, pattern, case_insensitive } => {
            Node::Regex { path, re: build(pattern, *case_insensitive), text_of: false }
        }
        Filter::TextOf { path, pattern, case_insensitive } => {
            Node::Regex { path, re: build(pattern, *case_insensitive), text_of: true }
        }
    }
}

impl Node<'_> {
    fn matches(&self, doc: &BsonDocument) -> bool {
        match self {
            Self::True => true,
            Self::And(ns) => ns.iter().all(|n| n.matches(doc)),
            Self::Or(ns) => ns.iter().any(|n| n.matches(doc)),
            Self::Eq { path, value } => get_path(doc, path).is_some_and(|v| bson_equal(v, value)),
            Self::Regex { re: None, .. } => false,
            Self::Regex { path, re: Some(re), text_of: false } => {
                matches!(get_path(doc, path), Some(Bson::String(s)) if re.is_match(s))
            }
            Self::Regex { path, re: Some(re), text_of: true } => {
                get_path(doc, path).and_then(bson_to_text).is_some_and(|s| re.is_match(&s))
            }
        }
    }
}

/// Match a single document. Use a [`Matcher`] when scanning a collection.
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    Matcher::new(filter).matches(doc)
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        if parts.peek().is_none() {
            return cur.get(part);
        }
        match cur.get(part) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality with numeric coercion: `Int32(7)`, `Int64(7)` and `Double(7.0)` are equal.
#[must_use]
pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64_num(a), as_f64_num(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y) == Ordering::Equal,
        _ => a == b,
    }
}

/// Text representation of a value as the document store's string conversion produces it.
/// Integral doubles drop the fractional part (`120.0` → `"120"`). Values with no
/// string conversion (documents, arrays, binaries...) yield `None`.
#[must_use]
pub fn bson_to_text(v: &Bson) -> Option<String> {
    match v {
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(i) => Some(i.to_string()),
        Bson::Int64(i) => Some(i.to_string()),
        Bson::Double(f) => Some(double_to_text(*f)),
        Bson::Decimal128(d) => Some(d.to_string()),
        Bson::Boolean(b) => Some(b.to_string()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().ok(),
        _ => None,
    }
}

fn double_to_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

/// Apply a `$set` patch in place. Returns true when any field actually changed.
///
/// Paths follow the store's rules: no empty or `$`-prefixed segments, and a
/// dotted path may only descend through documents or missing fields. On error
/// `doc` may be partly updated, so callers apply patches to a copy.
///
/// # Errors
/// Returns `StoreWrite` naming the offending path.
pub fn apply_update(doc: &mut BsonDocument, upd: &UpdateDoc) -> Result<bool, ApiError> {
    let mut changed = false;
    for (path, value) in &upd.set {
        check_update_path(path)?;
        let (parents, last) = path.rsplit_once('.').unwrap_or(("", path.as_str()));
        let mut parent = &mut *doc;
        if !parents.is_empty() {
            for seg in parents.split('.') {
                parent = subdoc_mut(parent, seg, path)?;
            }
        }
        let old = parent.insert(last, value.clone());
        changed |= old.as_ref() != Some(value);
    }
    Ok(changed)
}

fn check_update_path(path: &str) -> Result<(), ApiError> {
    for seg in path.split('.') {
        if seg.is_empty() {
            return Err(ApiError::StoreWrite(format!(
                "The update path '{path}' contains an empty field name"
            )));
        }
        if seg.starts_with('$') {
            return Err(ApiError::StoreWrite(format!(
                "The dollar ($) prefixed field '{seg}' in '{path}' is not allowed in an update"
            )));
        }
    }
    Ok(())
}

fn subdoc_mut<'a>(
    parent: &'a mut BsonDocument,
    key: &str,
    path: &str,
) -> Result<&'a mut BsonDocument, ApiError> {
    match parent.entry(key.to_string()).or_insert_with(|| Bson::Document(BsonDocument::new())) {
        Bson::Document(d) => Ok(d),
        other => Err(ApiError::StoreWrite(format!(
            "Cannot create field '{path}' in element {{{key}: {other}}}"
        ))),
    }
}
