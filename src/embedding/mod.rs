//! Query embedding providers.
//!
//! - [`OpenAiEmbeddings`] calls an OpenAI-compatible `/embeddings` endpoint.
//! - [`HashEmbedder`] is a deterministic stand-in with no model behind it.

mod error;
pub mod openai;
pub mod provider;
pub mod stub;

#[cfg(test)]
mod tests;

pub use error::EmbeddingError;
pub use openai::{
    DEFAULT_COST_PER_MILLION_TOKENS, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDINGS_URL,
    OpenAiEmbeddings, OpenAiEmbeddingsConfig,
};
pub use provider::{EmbeddingBatch, EmbeddingProvider, EmbeddingUsage};
pub use stub::HashEmbedder;
