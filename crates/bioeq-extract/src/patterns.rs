//! Pattern stage: weighted regular expressions for reported CVintra values.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

use bioeq_common::{ExtractionCandidate, ExtractionMethod};
use regex::Regex;
use tracing::debug;

/// (pattern, confidence weight). Group 1 captures the percentage.
const PATTERNS: &[(&str, f64)] = &[
    // Explicit intra-subject CV
    (r"cv\s*intra[-\s]?subject\s*[=:]\s*(\d+\.?\d*)\s*%", 0.95),
    (r"intra[-\s]?subject\s+cv\s*[=:]\s*(\d+\.?\d*)\s*%", 0.95),
    (r"intra[-\s]?subject\s+coefficient\s+of\s+variation\s*[=:]\s*(\d+\.?\d*)\s*%", 0.95),
    (r"cv\s*\(intra[-\s]?subject\)\s*[=:]\s*(\d+\.?\d*)\s*%", 0.93),
    // CVintra without "subject"
    (r"cv\s*intra\s*[=:]\s*(\d+\.?\d*)\s*%", 0.92),
    (r"cvintra\s*[=:]\s*(\d+\.?\d*)\s*%", 0.92),
    // Within-subject
    (r"within[-\s]?subject\s+cv\s*[=:]\s*(\d+\.?\d*)\s*%", 0.90),
    (r"within[-\s]?subject\s+coefficient\s+of\s+variation\s*[=:]\s*(\d+\.?\d*)\s*%", 0.90),
    // Intra-individual
    (r"intra[-\s]?individual\s+cv\s*[=:]\s*(\d+\.?\d*)\s*%", 0.88),
    (r"intra[-\s]?individual\s+variability\s*[=:]\s*(\d+\.?\d*)\s*%", 0.88),
    (r"cv[\s(]*intra\s*[=:]\s*(\d+\.?\d*)\s*%", 0.85),
    // Table abbreviations
    (r"\bcvw\s*[=:]\s*(\d+\.?\d*)\s*%", 0.85),
    (r"\bcv_w\s*[=:]\s*(\d+\.?\d*)\s*%", 0.85),
    // Prose: "the intra-subject CV for Cmax was 15.8%"
    (r"intra[-\s]?subject\s+(?:cv|coefficient\s+of\s+variation|variability)(?:\s+(?:for|of)\s+(?:cmax|auc[\w\-∞]*))?\s+(?:was|is|of)\s+(?:approximately\s+|about\s+)?(\d+\.?\d*)\s*%", 0.80),
    (r"within[-\s]?subject\s+(?:cv|coefficient\s+of\s+variation|variability)(?:\s+(?:for|of)\s+(?:cmax|auc[\w\-∞]*))?\s+(?:was|were|is|of)\s+(?:approximately\s+|about\s+)?(\d+\.?\d*)\s*%", 0.78),
    // No percent sign
    (r"cv\s*intra[-\s]?subject\s*[=:]\s*(\d+\.?\d*)(?:\s|$|[,.;])", 0.70),
    (r"intra[-\s]?subject\s+cv\s*[=:]\s*(\d+\.?\d*)(?:\s|$|[,.;])", 0.70),
];

struct CompiledPattern {
    regex: Regex,
    weight: f64,
}

/// Compiled once, ordered by descending weight (stable for equal weights).
fn compiled() -> &'static [CompiledPattern] {
    static RE: OnceLock<Vec<CompiledPattern>> = OnceLock::new();
    RE.get_or_init(|| {
        let mut list: Vec<CompiledPattern> = PATTERNS
            .iter()
            .filter_map(|(src, weight)| match Regex::new(&format!("(?i){src}")) {
                Ok(regex) => Some(CompiledPattern { regex, weight: *weight }),
                Err(e) => {
                    tracing::warn!(pattern = src, error = %e, "Skipping invalid CVintra pattern");
                    None
                }
            })
            .collect();
        list.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        list
    })
}

pub fn pattern_count() -> usize {
    compiled().len()
}

fn overlaps(span: &Range<usize>, claimed: &[Range<usize>]) -> bool {
    claimed.iter().any(|c| span.start < c.end && c.start < span.end)
}

/// Run every pattern over `text`.
///
/// Higher-weight patterns claim their spans first; later matches overlapping a
/// claimed span are ignored, and a value already emitted is not repeated.
/// Out-of-range values are kept (they fail validity later). Output is sorted by
/// confidence, highest first.
pub fn pattern_candidates(text: &str) -> Vec<ExtractionCandidate> {
    let mut out: Vec<ExtractionCandidate> = Vec::new();
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();

    for pattern in compiled() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let span = whole.range();
            if overlaps(&span, &claimed) {
                continue;
            }
            claimed.push(span);

            let Some(raw) = caps.get(1).map(|m| m.as_str()) else { continue };
            let value: f64 = match raw.parse() {
                Ok(v) => v,
                Err(e) => {
                    debug!(raw, error = %e, "Discarding malformed CVintra capture");
                    continue;
                }
            };
            if !seen.insert(value.to_bits()) {
                continue;
            }
            out.push(
                ExtractionCandidate::new(value, pattern.weight, ExtractionMethod::Pattern)
                    .with_evidence(whole.as_str().trim()),
            );
        }
    }

    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out
}
