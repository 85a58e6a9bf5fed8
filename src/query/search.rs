//! Catalog search: one free-text term in, one store filter out.
//!
//! A term that coerces to a number is matched as a case-insensitive substring
//! of the *text form* of `price` and `availableSpaces`; any other term is
//! matched against `title` and `location`. A single request never searches
//! both field sets: `"120"` finds `price: 120` but not `title: "City120"`.

use crate::errors::ApiError;

use super::numeric::is_numeric;
use super::types::Filter;

/// Catalog fields matched when the term is numeric.
pub const NUMERIC_FIELDS: [&str; 2] = ["price", "availableSpaces"];
/// Catalog fields matched when the term is text.
pub const TEXT_FIELDS: [&str; 2] = ["title", "location"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Numeric,
    Text,
}

impl TermKind {
    #[must_use]
    pub fn classify(term: &str) -> Self {
        if is_numeric(term) { Self::Numeric } else { Self::Text }
    }

    #[must_use]
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Numeric => &NUMERIC_FIELDS,
            Self::Text => &TEXT_FIELDS,
        }
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    kind: TermKind,
}

impl SearchQuery {
    /// Validate a raw `term` query parameter.
    ///
    /// # Errors
    /// Returns `InvalidQuery` when the term is missing, empty, or contains a NUL
    /// character (the store rejects patterns with embedded nulls).
    pub fn parse(term: Option<&str>) -> Result<Self, ApiError> {
        match term {
            Some(t) if t.contains('\0') => {
                Err(ApiError::InvalidQuery("Search term must not contain NUL".into()))
            }
            Some(t) if !t.is_empty() => {
                Ok(Self { term: t.to_string(), kind: TermKind::classify(t) })
            }
            _ => Err(ApiError::InvalidQuery("Search term is required".into())),
        }
    }

    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    #[must_use]
    pub const fn kind(&self) -> TermKind {
        self.kind
    }

    /// Build the store filter. The term is escaped, so it always matches literally.
    #[must_use]
    pub fn to_filter(&self) -> Filter {
        let pattern = regex::escape(&self.term);
        let arms = self
            .kind
            .fields()
            .iter()
            .map(|field| match self.kind {
                TermKind::Numeric => Filter::TextOf {
                    path: (*field).to_string(),
                    pattern: pattern.clone(),
                    case_insensitive: true,
                },
                TermKind::Text => Filter::Regex {
                    path: (*field).to_string(),
                    pattern: pattern.clone(),
                    case_insensitive: true,
                },
            })
            .collect();
        Filter::Or(arms)
    }
}
