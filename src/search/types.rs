use serde::Serialize;

use crate::recipes::Recipe;

/// A recipe returned by the index, with its similarity and original position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate<'a> {
    #[serde(flatten)]
    pub recipe: &'a Recipe,
    /// Inner product with the query vector (higher = more similar)
    pub score: f32,
    /// 0-based position in the index's return order
    pub rank: usize,
}

/// Ranked results: descending score, unique ids, at most `k` entries.
pub type ResultSet<'a> = Vec<Candidate<'a>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_recipes: usize,
    pub index_type: &'static str,
    pub vector_dimension: usize,
    pub cache_size: usize,
    pub metadata_columns: Vec<String>,
}
