//! Query pipeline: embed, over-fetch, filter, diversify, truncate.
//!
//! Every expected failure (no corpus, embedding failure, unknown recipe id)
//! comes back as an empty result set and is reported through the log.

use std::collections::HashSet;

use crate::config::{Config, SearchConfig};
use crate::semantic::{EmbeddingClient, EmbeddingError, SearchHit, INDEX_TYPE};

use super::corpus::Corpus;
use super::diversify::diversify;
use super::filters::SearchFilters;
use super::types::{Candidate, IndexStats, ResultSet};

pub struct SearchEngine {
    corpus: Option<Corpus>,
    embedder: EmbeddingClient,
    settings: SearchConfig,
}

impl SearchEngine {
    pub fn new(corpus: Option<Corpus>, embedder: EmbeddingClient, settings: SearchConfig) -> Self {
        Self {
            corpus,
            embedder,
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, EmbeddingError> {
        let embedder = EmbeddingClient::from_config(&config.embedding, &config.cache)?;
        log::info!("Embedding queries with {}", embedder.model());
        let corpus = Corpus::open(config);

        Ok(Self::new(corpus, embedder, config.search.clone()))
    }

    pub fn is_loaded(&self) -> bool {
        self.corpus.is_some()
    }

    pub fn default_k(&self) -> usize {
        self.settings.default_k
    }

    /// Number of index results requested for `k` final results.
    pub fn overfetch(&self, k: usize, filtered: bool) -> usize {
        let factor = if filtered {
            self.settings.filtered_overfetch
        } else {
            self.settings.unfiltered_overfetch
        };
        k.saturating_mul(factor)
    }

    /// Semantic search with optional filters and title diversification.
    ///
    /// # Returns
    /// At most `k` recipes, most similar first.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        filters: Option<&SearchFilters>,
        diversity_boost: bool,
    ) -> ResultSet<'_> {
        let _span = tracing::debug_span!("search", k, diversity_boost).entered();

        let Some(corpus) = &self.corpus else {
            log::warn!("search requested but no index is loaded");
            return Vec::new();
        };

        if k == 0 {
            return Vec::new();
        }

        let vector = match self.embedder.embed_for(query, corpus.index().dimensions()) {
            Ok(vector) => vector,
            Err(err) => {
                log::error!("query embedding failed: {err}");
                return Vec::new();
            }
        };

        let filters = filters.filter(|f| !f.is_empty());
        let fetch = self.overfetch(k, filters.is_some());

        let hits = match corpus.index().search(&vector, fetch) {
            Ok(hits) => hits,
            Err(err) => {
                log::error!("index search failed: {err}");
                return Vec::new();
            }
        };

        let mut results = candidates(corpus, &hits);
        let fetched = results.len();

        if let Some(filters) = filters {
            results = filters.apply(results);
        }

        if diversity_boost && results.len() > k {
            results = diversify(results, k, self.settings.diversity_threshold);
        }

        results.truncate(k);

        if results.len() < k {
            log::debug!(
                "returning {} of {k} requested results from {fetched} candidates",
                results.len()
            );
        }

        results
    }

    /// Search for recipes containing every listed ingredient.
    ///
    /// An empty list places no constraint and behaves like a plain search.
    pub fn search_by_ingredients<S: AsRef<str>>(
        &self,
        ingredients: &[S],
        k: usize,
    ) -> ResultSet<'_> {
        let names: Vec<&str> = ingredients.iter().map(|i| i.as_ref()).collect();
        let query = format!("Recipe with ingredients: {}", names.join(", "));
        let filters = SearchFilters::new().with_required_ingredients(&names);

        self.search(&query, k, Some(&filters), false)
    }

    /// Recipes similar to `recipe_id`, never including the recipe itself.
    pub fn get_similar_recipes(&self, recipe_id: &str, k: usize) -> ResultSet<'_> {
        let Some(corpus) = &self.corpus else {
            log::warn!("similar recipes requested but no index is loaded");
            return Vec::new();
        };

        let Some(recipe) = corpus.store().find(recipe_id) else {
            log::info!("recipe {recipe_id} not found");
            return Vec::new();
        };

        let ingredients: String = recipe
            .ingredients
            .chars()
            .take(self.settings.similar_ingredients_chars)
            .collect();
        let query = format!("{} {}", recipe.title, ingredients);

        let mut results: ResultSet<'_> = self
            .search(&query, k.saturating_add(1), None, false)
            .into_iter()
            .filter(|c| c.recipe.id != recipe_id)
            .collect();
        results.truncate(k);

        results
    }

    pub fn stats(&self) -> Option<IndexStats> {
        let corpus = self.corpus.as_ref()?;

        Some(IndexStats {
            total_recipes: corpus.index().len(),
            index_type: INDEX_TYPE,
            vector_dimension: corpus.index().dimensions(),
            cache_size: self.embedder.cache_size(),
            metadata_columns: corpus.store().columns().to_vec(),
        })
    }
}

/// Join index hits with metadata rows.
///
/// Keeps index order, assigns ranks by position, skips rows without
/// metadata and repeated ids, then stable-sorts by descending score.
fn candidates<'a>(corpus: &'a Corpus, hits: &[SearchHit]) -> Vec<Candidate<'a>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(hits.len());
    let mut out = Vec::with_capacity(hits.len());

    for (rank, hit) in hits.iter().enumerate() {
        let Some(recipe) = corpus.store().get(hit.row) else {
            log::warn!("index row {} has no metadata", hit.row);
            continue;
        };

        if !seen.insert(recipe.id.as_str()) {
            continue;
        }

        out.push(Candidate {
            recipe,
            score: hit.score,
            rank,
        });
    }

    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}
