//! Delegate stage: instruction text and defensive parsing of free-form replies.

use bioeq_common::{ExtractionCandidate, ExtractionMethod};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const INSTRUCTION: &str = "You are a pharmacokinetics expert extracting structured data from scientific abstracts.

TASK:
Extract the intra-subject coefficient of variation (CVintra) from the text.

CVintra is the within-subject variability of a pharmacokinetic parameter, expressed in percent.
It may appear as CVintra, intra-subject CV, within-subject CV, CVw, or intra-individual variability.

RULES:
1. Extract only CVintra, never inter-subject variability.
2. Report the value in percent.
3. If several values are given, prefer Cmax, then AUC.
4. If no CVintra is stated, return null. Do not guess.
5. Evidence must be copied exactly from the text.

Reply with a single JSON object and nothing else:
{\"cvintra\": number | null, \"confidence\": number between 0 and 1, \"evidence\": \"exact sentence\" | null}";

/// Confidence band applied to delegate replies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    #[serde(default = "default_floor")]
    pub floor: f64,
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    /// Used when the reply carries no confidence.
    #[serde(default = "default_confidence")]
    pub default: f64,
}

fn default_floor()      -> f64 { 0.5 }
fn default_ceiling()    -> f64 { 0.8 }
fn default_confidence() -> f64 { 0.7 }

impl Default for ConfidenceBand {
    fn default() -> Self {
        Self { floor: default_floor(), ceiling: default_ceiling(), default: default_confidence() }
    }
}

/// Truncate to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Locate the first balanced `{...}` in `reply`, honouring JSON strings.
pub fn first_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in reply[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&reply[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn number_field(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Turn a delegate reply into at most one candidate.
///
/// `source_text` is the passage the delegate saw; evidence that is not a
/// verbatim substring of it drops the confidence to the band floor.
pub fn parse_reply(reply: &str, source_text: &str, band: &ConfidenceBand) -> Option<ExtractionCandidate> {
    let Some(object) = first_json_object(reply) else {
        debug!("Delegate reply carried no JSON object");
        return None;
    };
    let json: serde_json::Value = match serde_json::from_str(object) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Delegate reply JSON did not parse");
            return None;
        }
    };

    let value = number_field(&json["cvintra"])?;
    if !value.is_finite() {
        return None;
    }

    let evidence = json["evidence"].as_str().unwrap_or("").trim().to_string();
    let verbatim = !evidence.is_empty() && source_text.contains(&evidence);
    let confidence = if verbatim {
        number_field(&json["confidence"])
            .filter(|c| c.is_finite())
            .unwrap_or(band.default)
            .clamp(band.floor, band.ceiling)
    } else {
        band.floor
    };

    Some(ExtractionCandidate::new(value, confidence, ExtractionMethod::Delegate).with_evidence(evidence))
}
