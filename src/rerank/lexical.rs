use std::collections::HashSet;

use async_trait::async_trait;

use super::error::RerankerError;
use super::model::RerankModel;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through",
    "during", "before", "after", "above", "below", "between", "under", "then", "once", "here",
    "there", "when", "where", "why", "how", "all", "each", "few", "more", "most", "other",
    "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very",
    "just", "and", "but", "if", "or", "because", "until", "while", "what", "which", "who",
    "whom", "this", "that", "these", "those", "am", "it", "its",
];

/// Term-overlap scorer: no model, deterministic, output in `(0, 1)`.
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    stop_words: HashSet<&'static str>,
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl LexicalReranker {
    pub fn new() -> Self {
        Self::default()
    }

    fn terms<'a>(&self, lowered: &'a str) -> HashSet<&'a str> {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !self.stop_words.contains(w))
            .collect()
    }

    /// Sigmoid of `0.6 * recall + 0.4 * jaccard` over non-stopword terms.
    pub fn score_pair(&self, query: &str, passage: &str) -> f32 {
        let query_lower = query.to_lowercase();
        let passage_lower = passage.to_lowercase();
        let query_terms = self.terms(&query_lower);
        let passage_terms = self.terms(&passage_lower);

        if query_terms.is_empty() {
            let len_ratio = (query.len().min(passage.len()) as f32)
                / (query.len().max(passage.len()).max(1) as f32);
            return len_ratio * 0.3;
        }

        let matches = query_terms.intersection(&passage_terms).count();
        let recall = matches as f32 / query_terms.len() as f32;

        let union = query_terms.union(&passage_terms).count();
        let jaccard = if union > 0 {
            matches as f32 / union as f32
        } else {
            0.0
        };

        let base_score = 0.6 * recall + 0.4 * jaccard;
        let normalized = 1.0 / (1.0 + (-8.0 * (base_score - 0.5)).exp());

        normalized.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl RerankModel for LexicalReranker {
    async fn score_batch(
        &self,
        query: &str,
        passages: &[&str],
    ) -> Result<Vec<f32>, RerankerError> {
        Ok(passages
            .iter()
            .map(|passage| self.score_pair(query, passage))
            .collect())
    }

    fn name(&self) -> &str {
        "lexical"
    }
}
