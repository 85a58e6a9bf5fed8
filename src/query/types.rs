use bson::{Bson, Document as BsonDocument};

// Deeper paths never match.
pub(crate) const MAX_PATH_DEPTH: usize = 32;

/// Store-independent filter expression.
///
/// `MemoryStore` evaluates it directly; `MongoStore` renders it to a native
/// filter document with [`super::to_mongo_filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Field equals value. Numbers compare by value across Int32/Int64/Double.
    Eq { path: String, value: Bson },
    /// String field matches the pattern.
    Regex { path: String, pattern: String, case_insensitive: bool },
    /// Field, converted to its text representation first, matches the pattern.
    /// Lets substring patterns reach numeric fields.
    TextOf { path: String, pattern: String, case_insensitive: bool },
}

impl Filter {
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Eq { path: path.into(), value: value.into() }
    }

    /// Field paths this filter inspects, in order of appearance.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::True => {}
            Self::And(fs) | Self::Or(fs) => fs.iter().for_each(|f| f.collect_paths(out)),
            Self::Eq { path, .. } | Self::Regex { path, .. } | Self::TextOf { path, .. } => {
                out.push(path.as_str());
            }
        }
    }
}

/// Partial-field merge patch (`$set` semantics). Dotted keys address nested fields.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
}

impl UpdateDoc {
    /// Every top-level field of `patch` overwrites the same-named document field.
    #[must_use]
    pub fn from_patch(patch: BsonDocument) -> Self {
        Self { set: patch.into_iter().collect() }
    }
}
