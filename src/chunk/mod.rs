//! Chunk model and the per-stage candidate wrappers.
//!
//! A [`Chunk`] is created once by an external loader and shared as `Arc<Chunk>` from then
//! on; candidates only pair that shared reference with a score.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::CHARS_PER_TOKEN;

/// Immutable unit of extracted text plus structural metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    text: String,
    source_file: String,
    #[serde(default)]
    section: String,
    #[serde(default)]
    heading: String,
    chunk_index: u32,
    #[serde(default)]
    token_count: u32,
}

impl Chunk {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source_file: impl Into<String>,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_file: source_file.into(),
            section: String::new(),
            heading: String::new(),
            chunk_index,
            token_count: 0,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = heading.into();
        self
    }

    pub fn with_token_count(mut self, token_count: u32) -> Self {
        self.token_count = token_count;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Loader-assigned token count (0 when the loader did not count).
    pub fn token_count(&self) -> u32 {
        self.token_count
    }

    /// Token count, falling back to a character estimate when the loader left it at 0.
    pub fn effective_tokens(&self) -> usize {
        if self.token_count > 0 {
            self.token_count as usize
        } else {
            estimate_tokens(&self.text)
        }
    }

    /// Returns `true` if `other` directly follows `self` in the same source file.
    pub fn precedes(&self, other: &Chunk) -> bool {
        self.source_file == other.source_file
            && self.chunk_index.checked_add(1) == Some(other.chunk_index)
    }
}

/// Stage 1 output: a chunk with the index's raw similarity.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Arc<Chunk>,
    /// Score as returned by the vector index.
    pub raw_score: f32,
    /// Normalized `[0, 1]` score. Equal to `raw_score` until Stage 2 normalizes it.
    pub score: f32,
}

impl Candidate {
    pub fn new(chunk: Arc<Chunk>, raw_score: f32) -> Self {
        Self {
            chunk,
            raw_score,
            score: raw_score,
        }
    }
}

/// Stage 3 output: a chunk ordered by the pairwise scoring model.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub chunk: Arc<Chunk>,
    pub rerank_score: f32,
    /// Stage 2 normalized similarity the candidate entered reranking with.
    pub similarity: f32,
}

impl RankedCandidate {
    pub fn new(chunk: Arc<Chunk>, rerank_score: f32, similarity: f32) -> Self {
        Self {
            chunk,
            rerank_score,
            similarity,
        }
    }
}

/// Estimates tokens as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Lower-cased, whitespace-collapsed prefix of `text` (at most `prefix_chars` chars).
pub fn text_signature(text: &str, prefix_chars: usize) -> String {
    let lowered = text.to_lowercase();
    let mut signature = String::with_capacity(prefix_chars.min(lowered.len()));
    let mut taken = 0usize;

    for (i, word) in lowered.split_whitespace().enumerate() {
        if i > 0 {
            if taken == prefix_chars {
                break;
            }
            signature.push(' ');
            taken += 1;
        }
        for ch in word.chars() {
            if taken == prefix_chars {
                return signature;
            }
            signature.push(ch);
            taken += 1;
        }
    }

    signature
}
