//! Remote embedding client.
//!
//! Provides a high-level interface for turning query text into vectors:
//! - In-memory cache keyed by a digest of the text
//! - Bounded retry with exponential backoff on rate limiting
//! - L2 normalisation so inner product equals cosine similarity

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{CacheConfig, EmbeddingConfig};
use crate::semantic::cache::QueryCache;
use crate::semantic::retry::{Attempt, RetryError, RetryPolicy, Sleeper, ThreadSleeper};

/// Distinguishes search-time queries from index-build documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Query,
    Document,
}

/// Request body sent to the embedding service.
#[derive(Debug, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub input: Vec<&'a str>,
    pub model: &'a str,
    pub input_type: InputType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Raw HTTP outcome: status code and body text.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// Sends one embedding request and reports what came back.
pub trait EmbeddingTransport: Send + Sync {
    fn post(&self, request: &EmbeddingRequest<'_>) -> Result<TransportResponse, TransportError>;
}

/// Transport over `reqwest::blocking`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        if api_key.is_none() {
            log::warn!(
                "no embedding API key configured; requests to {url} will be unauthenticated"
            );
        }

        Ok(Self {
            client,
            url: url.to_string(),
            api_key,
        })
    }
}

impl EmbeddingTransport for HttpTransport {
    fn post(&self, request: &EmbeddingRequest<'_>) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(TransportResponse { status, body })
    }
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP client initialization failed: {0}")]
    InitFailed(String),

    #[error("embedding API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("embedding failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Maximum number of body characters kept in error messages.
const ERROR_BODY_CHARS: usize = 100;

/// Client for the remote embedding service.
pub struct EmbeddingClient {
    transport: Box<dyn EmbeddingTransport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
    model: String,
    input_type: InputType,
    cache: QueryCache,
}

impl EmbeddingClient {
    pub fn new(
        model: &str,
        transport: Box<dyn EmbeddingTransport>,
        policy: RetryPolicy,
        cache: QueryCache,
    ) -> Self {
        Self {
            transport,
            sleeper: Box::new(ThreadSleeper),
            policy,
            model: model.to_string(),
            input_type: InputType::Query,
            cache,
        }
    }

    /// Build a query-side client talking HTTP, as configured.
    pub fn from_config(
        embedding: &EmbeddingConfig,
        cache: &CacheConfig,
    ) -> Result<Self, EmbeddingError> {
        let transport = HttpTransport::new(
            &embedding.api_url,
            embedding.api_key(),
            Duration::from_secs(embedding.timeout_secs),
        )?;

        Ok(Self::new(
            &embedding.model,
            Box::new(transport),
            embedding.retry_policy(),
            cache.build(),
        )
        .with_input_type(embedding.input_type))
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Embed `text`, serving from the cache when possible.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_inner(text, true, None)
    }

    /// Embed `text`, optionally bypassing the cache for both read and write.
    pub fn embed_with(&self, text: &str, use_cache: bool) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_inner(text, use_cache, None)
    }

    /// Embed `text` for an index of `dimensions`; cached vectors of another
    /// length are discarded and refetched.
    pub fn embed_for(&self, text: &str, dimensions: usize) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_inner(text, true, Some(dimensions))
    }

    fn embed_inner(
        &self,
        text: &str,
        use_cache: bool,
        dimensions: Option<usize>,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if use_cache {
            if let Some(vector) = self.cache.get(text, dimensions) {
                log::debug!("embedding cache hit");
                return Ok(vector);
            }
        }

        let vector = self.fetch(text)?;

        if use_cache {
            self.cache.insert(text, vector.clone());
        }

        Ok(vector)
    }

    fn fetch(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            input: vec![text],
            model: &self.model,
            input_type: self.input_type,
        };

        let outcome = self.policy.run(self.sleeper.as_ref(), |_attempt| {
            let response = match self.transport.post(&request) {
                Ok(response) => response,
                Err(err) => return Attempt::Transient(err.to_string()),
            };

            match response.status {
                200 => match parse_embedding(&response.body) {
                    Ok(vector) => Attempt::Done(vector),
                    Err(err) => Attempt::Transient(err),
                },
                429 => Attempt::RateLimited,
                status => {
                    let body: String = response.body.chars().take(ERROR_BODY_CHARS).collect();
                    log::error!("embedding API error {status}: {body}");
                    Attempt::Abort(EmbeddingError::Api { status, body })
                }
            }
        });

        outcome.map_err(|err| match err {
            RetryError::Aborted(err) => err,
            RetryError::Exhausted {
                attempts,
                last_error,
            } => EmbeddingError::RetriesExhausted {
                attempts,
                last_error,
            },
        })
    }
}

/// Extract `data[0].embedding` from a response body and normalise it.
fn parse_embedding(body: &str) -> Result<Vec<f32>, String> {
    let response: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed embedding response: {e}"))?;

    let mut vector = response
        .data
        .into_iter()
        .next()
        .map(|datum| datum.embedding)
        .ok_or_else(|| "embedding response has no data".to_string())?;

    if vector.is_empty() {
        return Err("embedding response has an empty vector".to_string());
    }

    if !normalize_l2(&mut vector) {
        return Err("embedding response has a zero-norm vector".to_string());
    }

    Ok(vector)
}

/// Scale `vector` to unit length in place.
///
/// Returns false, leaving the vector untouched, when its norm is zero.
pub fn normalize_l2(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON || !norm.is_finite() {
        return false;
    }

    for value in vector.iter_mut() {
        *value /= norm;
    }

    true
}

/// SHA-256 of the model name, stored in index headers.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}
