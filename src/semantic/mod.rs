//! Embedding and vector-index infrastructure for recipe search.
//!
//! # Architecture
//!
//! - `embeddings`: Remote embedding client with caching and retry
//! - `cache`: Engine-owned query vector cache
//! - `retry`: Bounded retry loop and sleeper seam
//! - `index`: In-memory inner-product vector index
//! - `storage`: Binary file I/O for the index

mod cache;
pub mod embeddings;
mod index;
pub mod retry;
mod storage;

pub use cache::QueryCache;
pub use embeddings::{
    model_id_hash, EmbeddingClient, EmbeddingError, EmbeddingRequest, EmbeddingTransport,
    InputType, TransportError, TransportResponse,
};
pub use index::{SearchHit, VectorIndex, INDEX_TYPE};
pub use retry::{RetryPolicy, Sleeper};
pub use storage::{VectorStorage, VectorStorageError};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "voyage-large-2";

/// Default embedding endpoint
pub const DEFAULT_API_URL: &str = "https://api.voyageai.com/v1/embeddings";
