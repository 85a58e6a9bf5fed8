//! Filter model, evaluation, store rendering and the catalog search builder.
mod eval;
pub mod numeric;
mod render;
mod search;
mod types;

pub use eval::{Matcher, apply_update, bson_equal, bson_to_text, eval_filter};
pub use numeric::{coerce_number, is_numeric, parse_int_prefix};
pub use render::{to_mongo_filter, to_mongo_update};
pub use search::{NUMERIC_FIELDS, SearchQuery, TEXT_FIELDS, TermKind};
pub use types::{Filter, UpdateDoc};
