//! Test fixtures for integration tests.

use std::sync::Arc;

use funnel::{
    Chunk, FunnelConfig, MockVectorIndex, RerankConfig, RetrieverConfig, Scope,
};

pub const DIM: usize = 8;

pub const JOB_ID: &str = "job-fixture";

pub fn scope() -> Scope {
    Scope::new(JOB_ID)
}

pub fn query_vector() -> Vec<f32> {
    vec![0.25; DIM]
}

/// Funnel settings sized for the fixture corpus: 50 candidates, 15 after rerank.
pub fn funnel_config() -> FunnelConfig {
    FunnelConfig {
        retriever: RetrieverConfig::default()
            .with_embedding_dim(DIM)
            .with_top_k(50),
        rerank: RerankConfig::default().with_top_k(15),
        ..FunnelConfig::default()
    }
}

pub struct ChunkBuilder {
    file: String,
    index: u32,
    text: Option<String>,
    section: String,
    heading: String,
    tokens: u32,
}

impl ChunkBuilder {
    pub fn new(file: &str, index: u32) -> Self {
        Self {
            file: file.to_string(),
            index,
            text: None,
            section: String::new(),
            heading: String::new(),
            tokens: 40,
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn section(mut self, section: &str, heading: &str) -> Self {
        self.section = section.to_string();
        self.heading = heading.to_string();
        self
    }

    pub fn tokens(mut self, tokens: u32) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn build(self) -> Arc<Chunk> {
        let id = format!("{}#{}", self.file, self.index);
        let text = self
            .text
            .unwrap_or_else(|| format!("{} paragraph {} of the tender", self.file, self.index));
        Arc::new(
            Chunk::new(id, text, self.file, self.index)
                .with_section(self.section)
                .with_heading(self.heading)
                .with_token_count(self.tokens),
        )
    }
}

/// `n` scores spread evenly over `[lo, hi]`, best first.
pub fn spread_scores(n: usize, lo: f32, hi: f32) -> Vec<f32> {
    if n <= 1 {
        return vec![hi; n];
    }
    (0..n)
        .map(|i| hi - (hi - lo) * i as f32 / (n - 1) as f32)
        .collect()
}

/// Index over `scope()` with one chunk per score. Chunk indices are spaced out so
/// nothing merges unless a test asks for it.
pub fn spread_index(scores: &[f32]) -> Arc<MockVectorIndex> {
    let index = Arc::new(MockVectorIndex::new());
    for (i, &score) in scores.iter().enumerate() {
        let file = format!("doc-{:02}.md", i % 5);
        index.insert_scored(&scope(), ChunkBuilder::new(&file, i as u32 * 10).build(), score);
    }
    index
}
