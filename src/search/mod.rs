//! Recipe search on top of the vector index.
//!
//! - `engine`: query orchestration (embed, over-fetch, filter, diversify)
//! - `filters`: tag and ingredient constraints
//! - `diversify`: title near-duplicate suppression
//! - `corpus`: index plus metadata loading

mod corpus;
mod diversify;
mod engine;
mod filters;
mod types;

pub use corpus::Corpus;
pub use engine::SearchEngine;
pub use filters::SearchFilters;
pub use types::{Candidate, ResultSet};
