//! Intent parsing
//!
//! Turns a free-form question into a `QueryIntent` against one survey.
//! Parsing is pure and deterministic: the same question and field set
//! always give the same intent, which is what makes `IntentCache` sound.

mod cache;
mod matcher;
mod parser;
mod suggest;
mod tokenizer;
mod types;

pub use cache::IntentCache;
pub use matcher::{best_match, field_score, levenshtein_distance, token_similarity, FieldMatch};
pub use parser::{parse, IntentParser, DEFAULT_MATCH_THRESHOLD};
pub use suggest::{suggest, MAX_SUGGESTIONS};
pub use tokenizer::{normalize, Normalized};
pub use types::{
    Aggregation, FilterOperator, IntentFilter, QueryIntent, SortDirection, TimeWindow,
};
