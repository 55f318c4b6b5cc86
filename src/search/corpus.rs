//! The pre-built vector index together with its metadata rows.

use std::path::Path;

use crate::config::Config;
use crate::recipes::{MetadataError, MetadataStore};
use crate::semantic::{model_id_hash, VectorIndex, VectorStorage, VectorStorageError};

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("index file not found: {0}")]
    IndexNotFound(String),

    #[error("metadata file not found: {0}")]
    MetadataNotFound(String),

    #[error("index: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("index has {index} rows but metadata only has {metadata}")]
    RowMismatch { index: usize, metadata: usize },
}

pub struct Corpus {
    index: VectorIndex,
    store: MetadataStore,
}

impl Corpus {
    pub fn new(index: VectorIndex, store: MetadataStore) -> Result<Self, CorpusError> {
        if index.len() > store.len() {
            return Err(CorpusError::RowMismatch {
                index: index.len(),
                metadata: store.len(),
            });
        }

        Ok(Self { index, store })
    }

    /// Load an index file and its metadata CSV.
    ///
    /// The index must have been built with `model`.
    pub fn load(index_path: &Path, metadata_path: &Path, model: &str) -> Result<Self, CorpusError> {
        if !index_path.exists() {
            return Err(CorpusError::IndexNotFound(index_path.display().to_string()));
        }
        if !metadata_path.exists() {
            return Err(CorpusError::MetadataNotFound(metadata_path.display().to_string()));
        }

        let storage = VectorStorage::new(index_path.to_path_buf());
        let index = storage.load(&model_id_hash(model), None)?;
        let store = MetadataStore::load(metadata_path)?;

        Self::new(index, store)
    }

    /// Load the configured corpus, falling back to the secondary one when the
    /// primary files are missing.
    ///
    /// Returns `None` when neither can be loaded; searches then come back empty.
    pub fn open(config: &Config) -> Option<Self> {
        let model = &config.embedding.model;
        let corpus = &config.corpus;

        let primary = (
            config.resolve(&corpus.index_path),
            config.resolve(&corpus.metadata_path),
        );
        let fallback = corpus
            .fallback_index_path
            .as_deref()
            .zip(corpus.fallback_metadata_path.as_deref())
            .map(|(index, metadata)| (config.resolve(index), config.resolve(metadata)));

        for (index_path, metadata_path) in std::iter::once(primary).chain(fallback) {
            log::info!("Loading index: {}", index_path.display());
            match Self::load(&index_path, &metadata_path, model) {
                Ok(loaded) => {
                    if loaded.index.is_empty() {
                        log::warn!("{} has no rows", index_path.display());
                    }
                    log::info!(
                        "Engine ready. {} recipes indexed ({} dims)",
                        loaded.index.len(),
                        loaded.index.dimensions()
                    );
                    return Some(loaded);
                }
                Err(err @ (CorpusError::IndexNotFound(_) | CorpusError::MetadataNotFound(_))) => {
                    log::warn!("{err}");
                }
                Err(err) => {
                    log::error!("failed to load corpus: {err}");
                    return None;
                }
            }
        }

        log::error!("no index available; searches will return no results");
        None
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::Recipe;

    fn write_corpus(dir: &Path, stem: &str, model: &str) {
        let mut index = VectorIndex::new(2);
        index.push(vec![1.0, 0.0]).unwrap();
        index.push(vec![0.0, 1.0]).unwrap();
        VectorStorage::new(dir.join(format!("{stem}.bin")))
            .save(&index, &model_id_hash(model))
            .unwrap();

        std::fs::write(
            dir.join(format!("{stem}.csv")),
            "id,title,ingredients,tags\na,Soup,water,lunch\nb,Stew,beef,dinner\n",
        )
        .unwrap();
    }

    fn config_at(dir: &Path) -> Config {
        let mut config = Config::load_with(dir).unwrap();
        config.corpus.index_path = "big.bin".to_string();
        config.corpus.metadata_path = "big.csv".to_string();
        config.corpus.fallback_index_path = Some("small.bin".to_string());
        config.corpus.fallback_metadata_path = Some("small.csv".to_string());
        config
    }

    #[test]
    fn test_new_rejects_index_larger_than_metadata() {
        let mut index = VectorIndex::new(2);
        index.push(vec![1.0, 0.0]).unwrap();
        index.push(vec![0.0, 1.0]).unwrap();
        let store = MetadataStore::new(vec![Recipe::new("a", "Soup", "", "")]);

        assert!(matches!(
            Corpus::new(index, store),
            Err(CorpusError::RowMismatch { index: 2, metadata: 1 })
        ));
    }

    #[test]
    fn test_open_prefers_primary() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        write_corpus(dir.path(), "big", &config.embedding.model);
        write_corpus(dir.path(), "small", &config.embedding.model);

        let corpus = Corpus::open(&config).unwrap();
        assert_eq!(corpus.index().len(), 2);
        assert_eq!(corpus.store().find("a").unwrap().title, "Soup");
    }

    #[test]
    fn test_open_falls_back_when_primary_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        write_corpus(dir.path(), "small", &config.embedding.model);

        assert!(Corpus::open(&config).is_some());
    }

    #[test]
    fn test_open_without_files_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Corpus::open(&config_at(dir.path())).is_none());
    }

    #[test]
    fn test_model_mismatch_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        write_corpus(dir.path(), "big", "another-model");

        let loaded = Corpus::load(
            &dir.path().join("big.bin"),
            &dir.path().join("big.csv"),
            &config.embedding.model,
        );
        assert!(matches!(
            loaded,
            Err(CorpusError::Storage(VectorStorageError::ModelMismatch))
        ));
        assert!(Corpus::open(&config).is_none());
    }
}
