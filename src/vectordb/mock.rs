use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::chunk::Chunk;

use super::error::VectorDbError;
use super::index::VectorIndex;
use super::model::{Scope, SearchHit};

#[derive(Clone)]
struct MockPoint {
    scope: Scope,
    chunk: Arc<Chunk>,
    vector: Option<Vec<f32>>,
    fixed_score: Option<f32>,
}

/// In-process [`VectorIndex`] for tests.
///
/// Points either carry a vector (scored by cosine similarity) or a fixed score.
pub struct MockVectorIndex {
    points: RwLock<Vec<MockPoint>>,
    unavailable: AtomicBool,
    include_chunks: AtomicBool,
    latency: RwLock<Option<Duration>>,
    search_calls: AtomicUsize,
}

impl Default for MockVectorIndex {
    fn default() -> Self {
        Self {
            points: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            include_chunks: AtomicBool::new(true),
            latency: RwLock::new(None),
            search_calls: AtomicUsize::new(0),
        }
    }
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point scored by cosine similarity against the query.
    pub fn insert(&self, scope: &Scope, chunk: Arc<Chunk>, vector: Vec<f32>) {
        self.points.write().push(MockPoint {
            scope: scope.clone(),
            chunk,
            vector: Some(vector),
            fixed_score: None,
        });
    }

    /// Adds a point that always scores `score`, whatever the query.
    pub fn insert_scored(&self, scope: &Scope, chunk: Arc<Chunk>, score: f32) {
        self.points.write().push(MockPoint {
            scope: scope.clone(),
            chunk,
            vector: None,
            fixed_score: Some(score),
        });
    }

    /// Makes every search fail with [`VectorDbError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// When disabled, hits carry only `(chunk_id, raw_score)`.
    pub fn set_include_chunks(&self, include: bool) {
        self.include_chunks.store(include, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn knn_search(
        &self,
        query: &[f32],
        k: u64,
        scope: &Scope,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VectorDbError::Unavailable {
                message: "mock index marked unavailable".to_string(),
            });
        }

        let include_chunks = self.include_chunks.load(Ordering::SeqCst);
        let mut hits: Vec<SearchHit> = self
            .points
            .read()
            .iter()
            .filter(|p| &p.scope == scope)
            .map(|p| {
                let score = match (&p.vector, p.fixed_score) {
                    (_, Some(score)) => score,
                    (Some(vector), None) => cosine_similarity(query, vector),
                    (None, None) => 0.0,
                };
                let hit = SearchHit::new(p.chunk.id(), score);
                if include_chunks {
                    hit.with_chunk(Arc::clone(&p.chunk))
                } else {
                    hit
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(usize::try_from(k).unwrap_or(usize::MAX));
        Ok(hits)
    }

    async fn is_ready(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
