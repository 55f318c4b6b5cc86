use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::recipes::{MetadataStore, Recipe};
use crate::search::{Corpus, SearchEngine};
use crate::semantic::{
    EmbeddingClient, EmbeddingRequest, EmbeddingTransport, QueryCache, RetryPolicy, Sleeper,
    TransportError, TransportResponse, VectorIndex,
};


pub fn ok_body(vector: &[f32]) -> TransportResponse {
    TransportResponse {
        status: 200,
        body: serde_json::json!({ "data": [{ "embedding": vector }] }).to_string(),
    }
}

pub fn status(code: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status: code,
        body: body.to_string(),
    }
}

/// Replays queued responses in order; fails with a transport error once empty.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(
        responses: Vec<Result<TransportResponse, TransportError>>,
    ) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            responses: Mutex::new(responses.into()),
            calls: calls.clone(),
        };
        (transport, calls)
    }
}

impl EmbeddingTransport for ScriptedTransport {
    fn post(&self, _request: &EmbeddingRequest<'_>) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("script exhausted".to_string())))
    }
}

/// Answers every request with a vector derived from the input text.
pub struct KeyedTransport {
    embed: fn(&str) -> Vec<f32>,
    calls: Arc<AtomicUsize>,
}

impl KeyedTransport {
    pub fn new(embed: fn(&str) -> Vec<f32>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                embed,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl EmbeddingTransport for KeyedTransport {
    fn post(&self, request: &EmbeddingRequest<'_>) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = request.input.first().copied().unwrap_or_default();
        Ok(ok_body(&(self.embed)(text)))
    }
}

#[derive(Clone, Default)]
pub struct RecordingSleeper {
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

pub fn client(transport: impl EmbeddingTransport + 'static) -> (EmbeddingClient, RecordingSleeper) {
    let sleeper = RecordingSleeper::default();
    let client = EmbeddingClient::new(
        "voyage-large-2",
        Box::new(transport),
        RetryPolicy::default(),
        QueryCache::unbounded(),
    )
    .with_sleeper(Box::new(sleeper.clone()));
    (client, sleeper)
}

/// Query vectors for the fixture corpus: chocolate queries point along the
/// first axis, dinner queries along the second.
pub fn fixture_embedding(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    if text.contains("chocolate") {
        vec![1.0, 0.0, 0.0]
    } else if text.contains("dinner") {
        vec![0.0, 1.0, 0.0]
    } else {
        vec![1.0, 1.0, 1.0]
    }
}

pub fn fixture_recipes() -> Vec<(Recipe, Vec<f32>)> {
    vec![
        (
            Recipe::new("r0", "Chocolate Cake", "flour, cocoa, sugar, eggs", "dessert"),
            vec![1.0, 0.0, 0.0],
        ),
        (
            Recipe::new("r1", "Chocolate Cake", "flour, cocoa, butter", "dessert"),
            vec![0.99, 0.14, 0.0],
        ),
        (
            Recipe::new("r2", "Fudge Brownies", "cocoa, butter, sugar", "dessert"),
            vec![0.95, 0.31, 0.0],
        ),
        (
            Recipe::new(
                "r3",
                "Vegan Chocolate Mousse",
                "avocado, cocoa, maple syrup",
                "Vegan, dessert",
            ),
            vec![0.9, 0.43, 0.0],
        ),
        (
            Recipe::new("r4", "Lemon Tart", "flour, lemon, butter, sugar", "dessert"),
            vec![0.7, 0.71, 0.0],
        ),
        (
            Recipe::new("r5", "Vegan Chili", "beans, tomato, onion, garlic", "vegan, dinner"),
            vec![0.0, 1.0, 0.0],
        ),
        (
            Recipe::new("r6", "Beef Stew", "beef, carrot, onion, garlic", "dinner"),
            vec![0.0, 0.6, 0.8],
        ),
        (
            Recipe::new("r7", "Peanut Noodles", "noodles, peanut butter, garlic", "vegan, asian"),
            vec![0.0, 0.8, 0.6],
        ),
    ]
}

pub fn fixture_corpus() -> Corpus {
    let mut index = VectorIndex::new(3);
    let mut rows = Vec::new();
    for (recipe, vector) in fixture_recipes() {
        index.push(vector).unwrap();
        rows.push(recipe);
    }
    Corpus::new(index, MetadataStore::new(rows)).unwrap()
}

pub fn fixture_engine() -> (SearchEngine, Arc<AtomicUsize>) {
    let (transport, calls) = KeyedTransport::new(fixture_embedding);
    let (client, _) = client(transport);
    let engine = SearchEngine::new(Some(fixture_corpus()), client, SearchConfig::default());
    (engine, calls)
}
