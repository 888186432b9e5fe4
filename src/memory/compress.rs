//! Bounded text rendering of a [`JobMemoryRecord`].
//!
//! Rendering reads only the record, so a persisted and reloaded record yields the
//! same text.

use std::fmt::Write as _;

use super::types::{JobMemoryRecord, StageRecord};
use crate::constants::CHARS_PER_TOKEN;

const VERBOSE_FINDINGS: usize = 5;
const VERBOSE_FINDING_CHARS: usize = 200;
const COMPACT_FINDING_CHARS: usize = 80;
const LISTED_GAPS: usize = 3;
const TRUNCATION_MARKER: &str = "\n[... truncated]";

/// Renders `record` within `max_tokens` (chars / 4).
///
/// The newest `verbose_stages` entries keep their findings. When the text is too long
/// the verbose window shrinks first, then the oldest compact lines collapse into one
/// "omitted" line, and as a last resort the text is cut.
pub fn compress(record: &JobMemoryRecord, max_tokens: usize, verbose_stages: usize) -> String {
    let history = &record.stage_history;
    let total = history.len();
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);

    let head = render_head(record);
    let tail = render_tail(record);
    let lines: Vec<(String, String)> = history
        .iter()
        .map(|stage| (render_compact(stage), render_verbose(stage)))
        .collect();
    let widths: Vec<(usize, usize)> = lines
        .iter()
        .map(|(compact, verbose)| (compact.chars().count(), verbose.chars().count()))
        .collect();

    let mut fixed = head.chars().count() + tail.chars().count();
    if total > 0 {
        fixed += STAGES_HEADER.chars().count() + 1;
    }

    let mut verbose = verbose_stages.min(total);
    let mut omitted = 0usize;
    let mut stage_chars: usize = widths
        .iter()
        .enumerate()
        .map(|(i, (c, v))| if i >= total - verbose { *v } else { *c })
        .sum();

    loop {
        let omitted_chars = omitted_line(omitted).chars().count();
        if fixed + stage_chars + omitted_chars <= max_chars {
            return assemble(&head, &tail, &lines, verbose, omitted);
        }
        if verbose > 0 {
            let (c, v) = widths[total - verbose];
            stage_chars = stage_chars - v + c;
            verbose -= 1;
        } else if omitted < total {
            stage_chars -= widths[omitted].0;
            omitted += 1;
        } else {
            return truncate(&assemble(&head, &tail, &lines, 0, total), max_tokens);
        }
    }
}

const STAGES_HEADER: &str = "COMPLETED STAGES:\n";

fn omitted_line(omitted: usize) -> String {
    if omitted == 0 {
        return String::new();
    }
    format!("  … {omitted} earlier stages omitted\n")
}

fn assemble(
    head: &str,
    tail: &str,
    lines: &[(String, String)],
    verbose: usize,
    omitted: usize,
) -> String {
    let verbose_from = lines.len() - verbose;
    let mut out = String::from(head);

    if !lines.is_empty() {
        out.push_str(STAGES_HEADER);
        out.push_str(&omitted_line(omitted));
        for (i, (compact, full)) in lines.iter().enumerate().skip(omitted) {
            out.push_str(if i >= verbose_from { full } else { compact });
        }
        out.push('\n');
    }

    out.push_str(tail);
    out
}

fn render_head(record: &JobMemoryRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "JOB: {}", record.job_id);
    let _ = writeln!(out, "STATUS: {}", record.executive_summary);
    out.push('\n');
    out
}

/// Everything after the stage list, without the final newline.
fn render_tail(record: &JobMemoryRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CURRENT: {}", record.current_stage);
    out.push('\n');

    if !record.gaps.is_empty() {
        let _ = writeln!(out, "GAPS: {} identified", record.gaps.len());
        for gap in record.gaps.iter().take(LISTED_GAPS) {
            let _ = writeln!(out, "  - {gap}");
        }
        out.push('\n');
    }

    out.push_str("CONSTRAINTS:\n");
    let _ = writeln!(
        out,
        "  Budget: ${:.2} / ${:.2}",
        record.budget_used, record.budget_limit
    );
    let _ = writeln!(
        out,
        "  Time: {:.1}h / {:.1}h",
        record.elapsed_time.as_secs_f64() / 3600.0,
        record.time_limit.as_secs_f64() / 3600.0
    );

    if !record.risks.is_empty() {
        out.push('\n');
        out.push_str("RISKS:\n");
        for risk in &record.risks {
            let _ = writeln!(out, "  - {risk}");
        }
    }

    if out.ends_with('\n') {
        out.pop();
    }
    out
}

fn render_verbose(stage: &StageRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  Stage {}: Quality {:.0}, Cost ${:.2}",
        stage.stage_id, stage.quality_score, stage.cost
    );
    for finding in stage.key_findings.iter().take(VERBOSE_FINDINGS) {
        let _ = writeln!(out, "    - {}", clip(finding, VERBOSE_FINDING_CHARS));
    }
    out
}

fn render_compact(stage: &StageRecord) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "  Stage {}: Quality {:.0}, Cost ${:.2}",
        stage.stage_id, stage.quality_score, stage.cost
    );
    if let Some(first) = stage.key_findings.first() {
        let _ = write!(out, " | {}", clip(first, COMPACT_FINDING_CHARS));
    }
    out.push('\n');
    out
}

/// At most `max_chars` chars of `text`; a shortened text ends in an ellipsis.
fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(max_chars.saturating_sub(1))
        .map(|(byte, _)| byte)
        .unwrap_or(text.len());
    format!("{}…", &text[..cut])
}

/// Cuts `text` to `max_tokens`, ending in the truncation marker when it fits.
fn truncate(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let marker_chars = TRUNCATION_MARKER.chars().count();
    let (keep, marker) = if max_chars >= marker_chars {
        (max_chars - marker_chars, TRUNCATION_MARKER)
    } else {
        (max_chars, "")
    };
    let cut = text
        .char_indices()
        .nth(keep)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len());
    format!("{}{}", &text[..cut], marker)
}
