//! Tag and ingredient predicates applied after vector retrieval.
//!
//! Matching is case-insensitive substring containment against the raw
//! `tags` / `ingredients` text. Each pass only removes candidates and keeps
//! the order of the survivors.

use serde::Serialize;

use crate::recipes::Recipe;
use crate::search::types::Candidate;

/// Post-retrieval constraints. An empty list means "no constraint".
///
/// Terms are trimmed and lowercased on construction; blank terms are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchFilters {
    tags: Vec<String>,
    exclude_ingredients: Vec<String>,
    include_ingredients: Vec<String>,
}

fn normalize_terms<I, S>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.as_ref().trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep recipes carrying ANY of these tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_terms(tags);
        self
    }

    /// Drop recipes containing ANY of these ingredients.
    pub fn with_excluded_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_ingredients = normalize_terms(ingredients);
        self
    }

    /// Keep only recipes containing ALL of these ingredients.
    pub fn with_required_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_ingredients = normalize_terms(ingredients);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.exclude_ingredients.is_empty()
            && self.include_ingredients.is_empty()
    }

    pub fn matches_tags(&self, recipe: &Recipe) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let haystack = recipe.tags.to_lowercase();
        self.tags.iter().any(|tag| haystack.contains(tag.as_str()))
    }

    pub fn passes_exclusions(&self, recipe: &Recipe) -> bool {
        if self.exclude_ingredients.is_empty() {
            return true;
        }
        let haystack = recipe.ingredients.to_lowercase();
        !self
            .exclude_ingredients
            .iter()
            .any(|ingredient| haystack.contains(ingredient.as_str()))
    }

    pub fn has_required(&self, recipe: &Recipe) -> bool {
        if self.include_ingredients.is_empty() {
            return true;
        }
        let haystack = recipe.ingredients.to_lowercase();
        self.include_ingredients
            .iter()
            .all(|ingredient| haystack.contains(ingredient.as_str()))
    }

    /// Run the tag, exclusion and inclusion passes in that order.
    pub fn apply<'a>(&self, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
        let tagged: Vec<Candidate<'a>> = candidates
            .into_iter()
            .filter(|c| self.matches_tags(c.recipe))
            .collect();

        let allowed: Vec<Candidate<'a>> = tagged
            .into_iter()
            .filter(|c| self.passes_exclusions(c.recipe))
            .collect();

        allowed
            .into_iter()
            .filter(|c| self.has_required(c.recipe))
            .collect()
    }
}
