//! Stage 4: dedupe, merge, order, attribute and trim to the token budget.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use super::config::AssemblerConfig;
use super::error::{FunnelError, FunnelResult, FunnelStage, QueryContext};
use crate::chunk::{RankedCandidate, estimate_tokens, text_signature};


const BLOCK_SEPARATOR: &str = "\n\n---\n\n";
const MERGE_SEPARATOR: &str = "\n\n";

/// A contiguous run of chunks from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledBlock {
    pub source_file: String,
    pub section: String,
    pub heading: String,
    pub text: String,
    /// Empty when attribution is disabled.
    pub citation: String,
    pub chunk_ids: Vec<String>,
    pub first_chunk_index: u32,
    pub last_chunk_index: u32,
    /// Highest rerank score among the merged chunks.
    pub rerank_score: f32,
    /// Content plus citation tokens.
    pub token_count: usize,
}

impl AssembledBlock {
    fn from_run(run: &[RankedCandidate]) -> Option<Self> {
        let first = run.first()?;
        let last = run.last()?;

        let text = run
            .iter()
            .map(|c| c.chunk.text())
            .collect::<Vec<_>>()
            .join(MERGE_SEPARATOR);
        let content_tokens = if run.len() == 1 {
            first.chunk.effective_tokens()
        } else {
            run.iter().map(|c| c.chunk.effective_tokens()).sum::<usize>()
                + (run.len() - 1) * estimate_tokens(MERGE_SEPARATOR)
        };

        Some(Self {
            source_file: first.chunk.source_file().to_string(),
            section: first.chunk.section().to_string(),
            heading: first.chunk.heading().to_string(),
            text,
            citation: String::new(),
            chunk_ids: run.iter().map(|c| c.chunk.id().to_string()).collect(),
            first_chunk_index: first.chunk.chunk_index(),
            last_chunk_index: last.chunk.chunk_index(),
            rerank_score: run
                .iter()
                .map(|c| c.rerank_score)
                .fold(f32::NEG_INFINITY, f32::max),
            token_count: content_tokens,
        })
    }

    /// `"{citation}\n{text}"`, or the bare text without a citation.
    pub fn render(&self) -> String {
        if self.citation.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n{}", self.citation, self.text)
        }
    }
}

/// `[Source: {file}, Section {section} - {heading}]`, skipping empty or "Unknown" parts.
pub fn citation_for(source_file: &str, section: &str, heading: &str) -> String {
    let known = |s: &str| !s.is_empty() && s != "Unknown";

    let mut citation = format!(
        "[Source: {}",
        if source_file.is_empty() {
            "Unknown"
        } else {
            source_file
        }
    );
    if known(section) {
        citation.push_str(", Section ");
        citation.push_str(section);
    }
    if known(heading) {
        citation.push_str(" - ");
        citation.push_str(heading);
    }
    citation.push(']');
    citation
}

/// Stage 4 output handed to generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    /// Reading order: by source file, then chunk index.
    pub blocks: Vec<AssembledBlock>,
    pub total_tokens: usize,
    /// Distinct source files, sorted.
    pub sources: Vec<String>,
    pub degraded: bool,
    /// A single block larger than the budget was kept.
    pub over_budget: bool,
    pub dropped_blocks: usize,
    pub max_tokens: usize,
    pub target_tokens: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn within_target(&self) -> bool {
        self.total_tokens <= self.target_tokens
    }

    pub fn render(&self) -> String {
        self.blocks
            .iter()
            .map(AssembledBlock::render)
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    pub fn chunk_count(&self) -> usize {
        self.blocks.iter().map(|b| b.chunk_ids.len()).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: AssemblerConfig,
}

impl ContextAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Builds the context from Stage 3 output.
    ///
    /// `degraded` carries an upstream degradation (for example a reranker fallback)
    /// into the result.
    pub fn assemble(
        &self,
        ctx: &QueryContext,
        candidates: Vec<RankedCandidate>,
        degraded: bool,
    ) -> FunnelResult<AssembledContext> {
        let config = &self.config;
        let input = candidates.len();

        let mut unique = if config.deduplicate {
            dedupe_candidates(candidates, config.signature_chars)
        } else {
            candidates
        };
        let deduped = unique.len();

        unique.sort_by(|a, b| {
            a.chunk
                .source_file()
                .cmp(b.chunk.source_file())
                .then(a.chunk.chunk_index().cmp(&b.chunk.chunk_index()))
        });

        let mut blocks = build_blocks(&unique, config.merge_adjacent);
        if config.deduplicate {
            blocks = dedupe_blocks(blocks, config.signature_chars);
        }

        if config.attribute {
            for block in &mut blocks {
                block.citation = citation_for(&block.source_file, &block.section, &block.heading);
                block.token_count += estimate_tokens(&block.citation);
            }
        }

        let (blocks, dropped_blocks) = trim_to_budget(blocks, config.max_tokens);
        let total_tokens: usize = blocks.iter().map(|b| b.token_count).sum();

        let over_budget = total_tokens > config.max_tokens;
        if over_budget && blocks.len() > 1 {
            return Err(FunnelError::TokenBudgetViolation {
                context: ctx.at(FunnelStage::Assemble),
                total: total_tokens,
                budget: config.max_tokens,
            });
        }
        if over_budget {
            warn!(
                job_id = %ctx.job_id,
                tokens = total_tokens,
                budget = config.max_tokens,
                "Single block exceeds token budget, keeping it"
            );
        }

        let sources: BTreeSet<&str> = blocks.iter().map(|b| b.source_file.as_str()).collect();
        let sources: Vec<String> = sources.into_iter().map(str::to_string).collect();

        let context = AssembledContext {
            total_tokens,
            sources,
            degraded: degraded || over_budget,
            over_budget,
            dropped_blocks,
            max_tokens: config.max_tokens,
            target_tokens: config.target_tokens,
            blocks,
        };

        debug!(
            input,
            deduped,
            blocks = context.blocks.len(),
            dropped = dropped_blocks,
            tokens = context.total_tokens,
            within_target = context.within_target(),
            "Stage 4 assembly complete"
        );

        Ok(context)
    }
}

fn dedupe_candidates(candidates: Vec<RankedCandidate>, prefix_chars: usize) -> Vec<RankedCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(text_signature(c.chunk.text(), prefix_chars)))
        .collect()
}

fn dedupe_blocks(blocks: Vec<AssembledBlock>, prefix_chars: usize) -> Vec<AssembledBlock> {
    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .filter(|b| seen.insert(text_signature(&b.text, prefix_chars)))
        .collect()
}

/// Groups sorted candidates into blocks; with `merge`, consecutive chunks of one file
/// share a block.
fn build_blocks(sorted: &[RankedCandidate], merge: bool) -> Vec<AssembledBlock> {
    if !merge {
        return sorted
            .iter()
            .filter_map(|c| AssembledBlock::from_run(std::slice::from_ref(c)))
            .collect();
    }

    sorted
        .chunk_by(|a, b| a.chunk.precedes(&b.chunk))
        .filter_map(AssembledBlock::from_run)
        .collect()
}

/// Drops the lowest-scoring block (later one on ties) until the total fits or one
/// block is left. Returns the kept blocks in their original order.
fn trim_to_budget(mut blocks: Vec<AssembledBlock>, max_tokens: usize) -> (Vec<AssembledBlock>, usize) {
    let mut total: usize = blocks.iter().map(|b| b.token_count).sum();
    let mut dropped = 0;

    while total > max_tokens && blocks.len() > 1 {
        let victim = blocks
            .iter()
            .enumerate()
            .min_by(|(ia, a), (ib, b)| {
                a.rerank_score
                    .partial_cmp(&b.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i);

        let Some(victim) = victim else { break };
        let removed = blocks.remove(victim);
        total -= removed.token_count;
        dropped += 1;
    }

    (blocks, dropped)
}
