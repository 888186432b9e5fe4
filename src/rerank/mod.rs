//! Pairwise relevance models used by Stage 3.
//!
//! [`HttpReranker`] talks to a cross-encoder server; [`LexicalReranker`] is a
//! model-free fallback.

pub mod config;
pub mod error;
pub mod http;
pub mod lexical;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;

#[cfg(test)]
mod tests;

pub use config::HttpRerankerConfig;
pub use error::RerankerError;
pub use http::HttpReranker;
pub use lexical::LexicalReranker;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRerankModel;
pub use model::RerankModel;
