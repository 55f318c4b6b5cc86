use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::semantic::{InputType, QueryCache, RetryPolicy, DEFAULT_API_URL, DEFAULT_MODEL};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_API_KEY_ENV: &str = "VOYAGE_API_KEY";
/// Per-attempt request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RATE_LIMIT_BASE_SECS: u64 = 2;
const DEFAULT_TRANSPORT_RETRY_SECS: u64 = 2;

const DEFAULT_K: usize = 10;
const DEFAULT_FILTERED_OVERFETCH: usize = 5;
const DEFAULT_UNFILTERED_OVERFETCH: usize = 2;
/// Title word overlap above which a result counts as a near duplicate
const DEFAULT_DIVERSITY_THRESHOLD: f64 = 0.6;
const DEFAULT_SIMILAR_INGREDIENTS_CHARS: usize = 200;

const DEFAULT_INDEX_PATH: &str = "models/recipes_200k.bin";
const DEFAULT_METADATA_PATH: &str = "models/recipes_200k.csv";
const DEFAULT_FALLBACK_INDEX_PATH: &str = "models/spoonacular.bin";
const DEFAULT_FALLBACK_METADATA_PATH: &str = "models/spoonacular.csv";

/// Remote embedding service settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// `query` for search traffic, `document` when embedding corpus text
    #[serde(default = "default_input_type")]
    pub input_type: InputType,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Rate-limit backoff base; attempt n waits 2^n times this
    #[serde(default = "default_rate_limit_base_secs")]
    pub rate_limit_base_secs: u64,

    /// Fixed wait after a transport failure
    #[serde(default = "default_transport_retry_secs")]
    pub transport_retry_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            input_type: default_input_type(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_base_secs: DEFAULT_RATE_LIMIT_BASE_SECS,
            transport_retry_secs: DEFAULT_TRANSPORT_RETRY_SECS,
        }
    }
}

impl EmbeddingConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_rate_limit_base(Duration::from_secs(self.rate_limit_base_secs))
            .with_transport_delay(Duration::from_secs(self.transport_retry_secs))
    }
}

/// Query cache bounds. Unset means unbounded / never expires.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub max_entries: Option<usize>,

    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    pub fn build(&self) -> QueryCache {
        QueryCache::new(self.max_entries, self.ttl_secs.map(Duration::from_secs))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Over-retrieval multiplier when filters are present
    #[serde(default = "default_filtered_overfetch")]
    pub filtered_overfetch: usize,

    /// Over-retrieval multiplier without filters
    #[serde(default = "default_unfiltered_overfetch")]
    pub unfiltered_overfetch: usize,

    #[serde(default = "default_diversity_threshold")]
    pub diversity_threshold: f64,

    /// Ingredient characters used when building a "similar recipe" query
    #[serde(default = "default_similar_ingredients_chars")]
    pub similar_ingredients_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_K,
            filtered_overfetch: DEFAULT_FILTERED_OVERFETCH,
            unfiltered_overfetch: DEFAULT_UNFILTERED_OVERFETCH,
            diversity_threshold: DEFAULT_DIVERSITY_THRESHOLD,
            similar_ingredients_chars: DEFAULT_SIMILAR_INGREDIENTS_CHARS,
        }
    }
}

/// Locations of the pre-built index and its metadata.
///
/// Relative paths resolve against the base path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_index_path")]
    pub index_path: String,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    #[serde(default = "default_fallback_index_path")]
    pub fallback_index_path: Option<String>,

    #[serde(default = "default_fallback_metadata_path")]
    pub fallback_metadata_path: Option<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            metadata_path: default_metadata_path(),
            fallback_index_path: default_fallback_index_path(),
            fallback_metadata_path: default_fallback_metadata_path(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_input_type() -> InputType {
    InputType::Query
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_rate_limit_base_secs() -> u64 {
    DEFAULT_RATE_LIMIT_BASE_SECS
}

fn default_transport_retry_secs() -> u64 {
    DEFAULT_TRANSPORT_RETRY_SECS
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_filtered_overfetch() -> usize {
    DEFAULT_FILTERED_OVERFETCH
}

fn default_unfiltered_overfetch() -> usize {
    DEFAULT_UNFILTERED_OVERFETCH
}

fn default_diversity_threshold() -> f64 {
    DEFAULT_DIVERSITY_THRESHOLD
}

fn default_similar_ingredients_chars() -> usize {
    DEFAULT_SIMILAR_INGREDIENTS_CHARS
}

fn default_index_path() -> String {
    DEFAULT_INDEX_PATH.to_string()
}

fn default_metadata_path() -> String {
    DEFAULT_METADATA_PATH.to_string()
}

fn default_fallback_index_path() -> Option<String> {
    Some(DEFAULT_FALLBACK_INDEX_PATH.to_string())
}

fn default_fallback_metadata_path() -> Option<String> {
    Some(DEFAULT_FALLBACK_METADATA_PATH.to_string())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let emb = &self.embedding;
        if emb.api_url.trim().is_empty() {
            bail!("embedding.api_url must not be empty");
        }
        if emb.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if emb.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be greater than 0");
        }
        if emb.max_attempts == 0 {
            bail!("embedding.max_attempts must be greater than 0");
        }

        if self.cache.max_entries == Some(0) {
            bail!("cache.max_entries must be greater than 0 when set");
        }
        if self.cache.ttl_secs == Some(0) {
            bail!("cache.ttl_secs must be greater than 0 when set");
        }

        let search = &self.search;
        if search.default_k == 0 {
            bail!("search.default_k must be greater than 0");
        }
        if search.filtered_overfetch == 0 || search.unfiltered_overfetch == 0 {
            bail!("search over-fetch multipliers must be greater than 0");
        }
        if !(0.0..=1.0).contains(&search.diversity_threshold) {
            bail!(
                "search.diversity_threshold must be between 0.0 and 1.0, got {}",
                search.diversity_threshold
            );
        }

        let corpus = &self.corpus;
        if corpus.fallback_index_path.is_some() != corpus.fallback_metadata_path.is_some() {
            bail!("corpus fallback index and metadata paths must be set together");
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if absent.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            std::fs::create_dir_all(base_path)
                .with_context(|| format!("creating {}", base_path.display()))?;
            log::info!("Creating default config at {}", path.display());
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("writing {}", path.display()))?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = self.base_path.join(CONFIG_FILE);
        let temp_path = path.with_extension("yaml.tmp");

        std::fs::write(&temp_path, serde_yml::to_string(&self)?)?;
        std::fs::rename(&temp_path, &path)?;

        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a configured path against the base path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
