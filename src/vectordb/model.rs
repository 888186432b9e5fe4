use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use qdrant_client::qdrant::ScoredPoint;
use qdrant_client::qdrant::Value;

use crate::chunk::Chunk;

pub(crate) const PAYLOAD_SCOPE: &str = "scope";
pub(crate) const PAYLOAD_CHUNK_ID: &str = "chunk_id";
pub(crate) const PAYLOAD_TEXT: &str = "text";
pub(crate) const PAYLOAD_SOURCE_FILE: &str = "source_file";
pub(crate) const PAYLOAD_SECTION: &str = "section";
pub(crate) const PAYLOAD_HEADING: &str = "heading";
pub(crate) const PAYLOAD_CHUNK_INDEX: &str = "chunk_index";
pub(crate) const PAYLOAD_TOKEN_COUNT: &str = "token_count";

/// Collection/job partition a search is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A chunk and its embedding as written by the loader.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Arc<Chunk>,
    pub vector: Vec<f32>,
    pub scope: Scope,
}

impl IndexedChunk {
    pub fn new(chunk: Arc<Chunk>, vector: Vec<f32>, scope: Scope) -> Self {
        Self {
            chunk,
            vector,
            scope,
        }
    }

    pub fn point_id(&self) -> u64 {
        crate::hashing::point_id(self.scope.as_str(), self.chunk.id())
    }

    /// Payload stored alongside the vector so search hits can rebuild the chunk.
    pub(crate) fn payload(&self) -> HashMap<String, Value> {
        let chunk = &self.chunk;
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert(PAYLOAD_SCOPE.to_string(), self.scope.as_str().to_string().into());
        payload.insert(PAYLOAD_CHUNK_ID.to_string(), chunk.id().to_string().into());
        payload.insert(PAYLOAD_TEXT.to_string(), chunk.text().to_string().into());
        payload.insert(
            PAYLOAD_SOURCE_FILE.to_string(),
            chunk.source_file().to_string().into(),
        );
        payload.insert(PAYLOAD_SECTION.to_string(), chunk.section().to_string().into());
        payload.insert(PAYLOAD_HEADING.to_string(), chunk.heading().to_string().into());
        payload.insert(
            PAYLOAD_CHUNK_INDEX.to_string(),
            (chunk.chunk_index() as i64).into(),
        );
        payload.insert(
            PAYLOAD_TOKEN_COUNT.to_string(),
            (chunk.token_count() as i64).into(),
        );
        payload
    }
}

/// One nearest-neighbor hit: `(chunk_id, raw_score)` plus the chunk when the index
/// stores its metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub raw_score: f32,
    pub chunk: Option<Arc<Chunk>>,
}

impl SearchHit {
    pub fn new(chunk_id: impl Into<String>, raw_score: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            raw_score,
            chunk: None,
        }
    }

    pub fn with_chunk(mut self, chunk: Arc<Chunk>) -> Self {
        self.chunk = Some(chunk);
        self
    }

    /// Builds a hit from a Qdrant point; `None` if the payload has no chunk id.
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let payload = point.payload;

        let chunk_id = payload
            .get(PAYLOAD_CHUNK_ID)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())?;

        let text = payload.get(PAYLOAD_TEXT).and_then(|v| v.as_str());
        let source_file = payload.get(PAYLOAD_SOURCE_FILE).and_then(|v| v.as_str());

        let chunk = match (text, source_file) {
            (Some(text), Some(source_file)) => {
                let section = payload
                    .get(PAYLOAD_SECTION)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let heading = payload
                    .get(PAYLOAD_HEADING)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let chunk_index = payload
                    .get(PAYLOAD_CHUNK_INDEX)
                    .and_then(|v| v.as_integer())
                    .and_then(|i| u32::try_from(i).ok())
                    .unwrap_or(0);
                let token_count = payload
                    .get(PAYLOAD_TOKEN_COUNT)
                    .and_then(|v| v.as_integer())
                    .and_then(|i| u32::try_from(i).ok())
                    .unwrap_or(0);

                Some(Arc::new(
                    Chunk::new(chunk_id.clone(), text.clone(), source_file.clone(), chunk_index)
                        .with_section(section)
                        .with_heading(heading)
                        .with_token_count(token_count),
                ))
            }
            _ => None,
        };

        Some(SearchHit {
            chunk_id,
            raw_score: point.score,
            chunk,
        })
    }
}
