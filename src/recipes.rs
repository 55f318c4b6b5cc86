//! Row-indexed recipe metadata loaded from CSV.
//!
//! Row `n` describes the document stored at row `n` of the vector index.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

const REQUIRED_COLUMNS: [&str; 4] = ["id", "title", "ingredients", "tags"];

/// Names taken by the search result fields; such CSV columns are not carried.
const RESULT_FIELDS: [&str; 2] = ["score", "rank"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub ingredients: String,
    pub tags: String,
    /// Every other CSV column, e.g. `readyInMinutes` or `healthScore`
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Recipe {
    pub fn new(id: &str, title: &str, ingredients: &str, tags: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            ingredients: ingredients.to_string(),
            tags: tags.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("metadata is missing required column `{0}`")]
    MissingColumn(&'static str),
}

pub struct MetadataStore {
    rows: Vec<Recipe>,
    by_id: HashMap<String, usize>,
    columns: Vec<String>,
}

impl MetadataStore {
    /// Build a store from rows already in index order.
    pub fn new(rows: Vec<Recipe>) -> Self {
        let mut columns: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        for recipe in &rows {
            for key in recipe.extra.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        Self::with_columns(rows, columns)
    }

    fn with_columns(rows: Vec<Recipe>, columns: Vec<String>) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        for (row, recipe) in rows.iter().enumerate() {
            if by_id.contains_key(&recipe.id) {
                log::warn!("duplicate recipe id {} at row {row}; keeping the first", recipe.id);
                continue;
            }
            by_id.insert(recipe.id.clone(), row);
        }

        Self {
            rows,
            by_id,
            columns,
        }
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;
        let headers = csv_reader.headers()?.clone();

        let position = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(MetadataError::MissingColumn(name))
        };
        let id_col = position("id")?;
        let title_col = position("title")?;
        let ingredients_col = position("ingredients")?;
        let tags_col = position("tags")?;

        let mut rows = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let field = |col: usize| record.get(col).unwrap_or_default().to_string();

            let mut extra = BTreeMap::new();
            for (col, name) in headers.iter().enumerate() {
                if REQUIRED_COLUMNS.contains(&name) || RESULT_FIELDS.contains(&name) {
                    continue;
                }
                extra.insert(name.to_string(), field(col));
            }

            rows.push(Recipe {
                id: field(id_col),
                title: field(title_col),
                ingredients: field(ingredients_col),
                tags: field(tags_col),
                extra,
            });
        }

        log::debug!(
            "took {}ms to read {} recipes",
            now.elapsed().as_micros() as f64 / 1000.0,
            rows.len()
        );

        let columns = headers.iter().map(str::to_string).collect();
        Ok(Self::with_columns(rows, columns))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Recipe> {
        self.rows.get(row)
    }

    /// Find a recipe by its id.
    pub fn find(&self, id: &str) -> Option<&Recipe> {
        self.by_id.get(id).and_then(|&row| self.rows.get(row))
    }

    /// Column names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}
