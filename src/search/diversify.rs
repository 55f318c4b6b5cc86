//! Greedy title-based diversification.
//!
//! Walks candidates in relevance order and skips any whose title words
//! overlap too much with an already accepted title. Single pass: a rejected
//! candidate is never reconsidered and accepted ones are never swapped out.

use std::collections::HashSet;

use crate::search::types::Candidate;

/// Lowercased whitespace-separated words of a title.
pub fn title_words(title: &str) -> HashSet<String> {
    title.split_whitespace().map(str::to_lowercase).collect()
}

/// Share of `candidate`'s words that also appear in `prior`.
///
/// Normalised by the candidate's own word count, so the measure is not
/// symmetric.
pub fn title_overlap(candidate: &HashSet<String>, prior: &HashSet<String>) -> f64 {
    let shared = candidate.intersection(prior).count();
    shared as f64 / candidate.len().max(1) as f64
}

/// Keep at most `k` candidates whose titles overlap no accepted title by
/// more than `threshold`.
pub fn diversify<'a>(
    candidates: Vec<Candidate<'a>>,
    k: usize,
    threshold: f64,
) -> Vec<Candidate<'a>> {
    let mut selected = Vec::with_capacity(k.min(candidates.len()));
    let mut selected_titles: Vec<HashSet<String>> = Vec::new();

    for candidate in candidates {
        if selected.len() >= k {
            break;
        }

        let words = title_words(&candidate.recipe.title);

        let too_similar = selected_titles
            .iter()
            .any(|prior| title_overlap(&words, prior) > threshold);

        if too_similar {
            log::trace!("skipping near-duplicate title {:?}", candidate.recipe.title);
            continue;
        }

        selected_titles.push(words);
        selected.push(candidate);
    }

    selected
}
