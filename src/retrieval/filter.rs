//! Stage 2: similarity threshold with bounded relaxation.

use std::cmp::Ordering;

use tracing::debug;

use super::config::{FilterConfig, ScoreNormalization, StarvationPolicy};
use crate::chunk::Candidate;


/// Stage 2 result.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Survivors, best normalized score first.
    pub candidates: Vec<Candidate>,
    /// Threshold actually applied. In the top-N fallback, the lowest kept score.
    pub effective_threshold: f32,
    /// Relaxation steps taken below the configured threshold.
    pub relaxation_steps: usize,
    /// Whether the starvation policy decided the output.
    pub fallback: bool,
    pub input_count: usize,
}

impl FilterOutcome {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceFilter {
    config: FilterConfig,
}

impl RelevanceFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Thresholds tried in order: the configured one, then one per relaxation step,
    /// ending at the floor.
    pub fn relaxation_schedule(&self) -> Vec<f32> {
        let FilterConfig {
            threshold,
            relax_step,
            relax_floor,
            ..
        } = self.config;

        let span = (threshold - relax_floor).max(0.0);
        let steps = if relax_step > 0.0 {
            ((span / relax_step) - 1e-6).ceil().max(0.0) as usize
        } else {
            0
        };

        (0..=steps)
            .map(|i| round6((threshold - i as f32 * relax_step).max(relax_floor)))
            .collect()
    }

    /// Normalizes, sorts and thresholds `candidates`. Never fails; an empty input
    /// yields an empty outcome.
    pub fn filter(&self, candidates: Vec<Candidate>) -> FilterOutcome {
        let input_count = candidates.len();
        if candidates.is_empty() {
            return FilterOutcome {
                effective_threshold: self.config.threshold,
                ..FilterOutcome::default()
            };
        }

        let mut candidates = normalize(candidates, self.config.normalization);
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let required = self.config.min_survivors.min(input_count);
        let schedule = self.relaxation_schedule();

        for (step, &threshold) in schedule.iter().enumerate() {
            let passing = candidates.partition_point(|c| c.score >= threshold);
            if passing >= required {
                candidates.truncate(passing.min(self.config.max_survivors));
                debug!(
                    input = input_count,
                    survivors = candidates.len(),
                    threshold,
                    relaxation_steps = step,
                    "Stage 2 filter complete"
                );
                return FilterOutcome {
                    candidates,
                    effective_threshold: threshold,
                    relaxation_steps: step,
                    fallback: false,
                    input_count,
                };
            }
        }

        let relaxation_steps = schedule.len().saturating_sub(1);
        match self.config.starvation {
            StarvationPolicy::TopN => {
                candidates.truncate(required.min(self.config.max_survivors));
                let effective_threshold = candidates
                    .last()
                    .map(|c| c.score)
                    .unwrap_or(self.config.relax_floor);
                debug!(
                    input = input_count,
                    survivors = candidates.len(),
                    effective_threshold,
                    "Stage 2 below floor, keeping top candidates"
                );
                FilterOutcome {
                    candidates,
                    effective_threshold,
                    relaxation_steps,
                    fallback: true,
                    input_count,
                }
            }
            StarvationPolicy::Empty => {
                debug!(input = input_count, "Stage 2 below floor, returning nothing");
                FilterOutcome {
                    candidates: Vec::new(),
                    effective_threshold: self.config.relax_floor,
                    relaxation_steps,
                    fallback: true,
                    input_count,
                }
            }
        }
    }
}

fn normalize(mut candidates: Vec<Candidate>, normalization: ScoreNormalization) -> Vec<Candidate> {
    let finite = |s: f32| if s.is_finite() { s } else { 0.0 };

    match normalization {
        ScoreNormalization::Clamp => {
            for c in &mut candidates {
                c.score = finite(c.raw_score).clamp(0.0, 1.0);
            }
        }
        ScoreNormalization::Cosine => {
            for c in &mut candidates {
                c.score = ((finite(c.raw_score) + 1.0) / 2.0).clamp(0.0, 1.0);
            }
        }
        ScoreNormalization::MinMax => {
            let (min, max) = candidates
                .iter()
                .map(|c| finite(c.raw_score))
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
                    (lo.min(s), hi.max(s))
                });
            let range = max - min;
            for c in &mut candidates {
                c.score = if range > f32::EPSILON {
                    ((finite(c.raw_score) - min) / range).clamp(0.0, 1.0)
                } else {
                    1.0
                };
            }
        }
    }

    candidates
}

fn round6(value: f32) -> f32 {
    ((value as f64 * 1e6).round() / 1e6) as f32
}
