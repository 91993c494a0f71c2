/// Confidence and validity rules for CVintra evidence.
/// Values are percentages; confidences live in [0.0, 1.0].

use serde::{Deserialize, Serialize};

/// Domain bounds a candidate must satisfy to contribute to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidityBounds {
    #[serde(default = "default_min_value")]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    /// Exclusive lower bound on confidence.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_min_value()      -> f64 { 5.0 }
fn default_max_value()      -> f64 { 100.0 }
fn default_min_confidence() -> f64 { 0.3 }

impl Default for ValidityBounds {
    fn default() -> Self {
        Self {
            min_value:      default_min_value(),
            max_value:      default_max_value(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl ValidityBounds {
    pub fn accepts(&self, value: f64, confidence: f64) -> bool {
        value.is_finite()
            && value >= self.min_value
            && value <= self.max_value
            && confidence > self.min_confidence
    }

    pub fn in_range(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min_value && value <= self.max_value
    }

    /// Returns a description of the problem, if any.
    pub fn check(&self) -> Option<String> {
        if !(self.min_value < self.max_value) {
            return Some(format!(
                "min_value ({}) must be below max_value ({})",
                self.min_value, self.max_value
            ));
        }
        if !(0.0..1.0).contains(&self.min_confidence) {
            return Some(format!("min_confidence ({}) must be in [0, 1)", self.min_confidence));
        }
        None
    }
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population coefficient of variation (stdev / mean).
/// Zero for fewer than two values or a non-positive mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    if m <= 0.0 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt() / m
}

/// Multiplier applied to the mean confidence when contributing values disagree.
/// 1.0 for perfect agreement, never below 0.5.
pub fn disagreement_factor(values: &[f64]) -> f64 {
    (1.0 - coefficient_of_variation(values)).clamp(0.5, 1.0)
}

/// Round to two decimals, the precision reported to callers.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
