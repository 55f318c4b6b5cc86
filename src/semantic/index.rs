//! In-memory vector index with inner-product search.
//!
//! Rows are addressed by position and line up with metadata rows. Stored
//! vectors are expected to be unit length, so the inner product is the
//! cosine similarity.

/// Search hit from the vector index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Row position in the index (and the metadata store)
    pub row: usize,
    /// Inner product with the query
    pub score: f32,
}

/// Flat inner-product index over row-addressed document vectors.
pub struct VectorIndex {
    rows: Vec<Vec<f32>>,
    dimensions: usize,
}

/// Short label reported in index statistics.
pub const INDEX_TYPE: &str = "flat-inner-product";

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            rows: Vec::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a vector as the next row and return its position.
    ///
    /// Returns an error if the embedding has zero norm (cannot be normalized).
    pub fn push(&mut self, embedding: Vec<f32>) -> Result<usize, IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        if Self::l2_norm(&embedding) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.rows.push(embedding);
        Ok(self.rows.len() - 1)
    }

    pub fn get(&self, row: usize) -> Option<&[f32]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Iterate over `(row, vector)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f32])> {
        self.rows.iter().enumerate().map(|(row, v)| (row, v.as_slice()))
    }

    /// Return the `n` rows with the highest inner product against `query`.
    ///
    /// Results are sorted by score (highest first); equal scores keep row
    /// order.
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        if Self::l2_norm(query) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut hits: Vec<SearchHit> = self
            .rows
            .iter()
            .enumerate()
            .map(|(row, target)| SearchHit {
                row,
                score: Self::inner_product(query, target),
            })
            .collect();

        // Stable sort keeps row order among ties
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(n);

        Ok(hits)
    }

    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn inner_product(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}
