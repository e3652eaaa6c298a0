//! Category normalization and fuzzy matching
//!
//! Keeps one logical topic in one knowledge container. Labels are normalized
//! ([`normalize_category`]), then matched against known container names by
//! edit distance and, failing that, by keyword overlap
//! ([`CategoryMatcher::resolve`]).

mod categorizer;
mod matcher;
mod normalize;

pub use categorizer::{CategorySource, Categorizer};
pub use matcher::{edit_distance, jaccard, similarity_ratio, CategoryMatch, CategoryMatcher, MatchKind};
pub use normalize::{normalize_category, DEFAULT_MAX_LENGTH, FALLBACK_CATEGORY};
