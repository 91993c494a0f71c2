//! Aggregation of ranked candidates into a single CVintra estimate.

use bioeq_common::confidence::{disagreement_factor, mean, round2};
use bioeq_common::{AggregateResult, RankedSource, ValidityBounds};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Mean weighted by extraction confidence.
    #[default]
    WeightedMean,
    Mean,
    /// Even counts average the two middle values.
    Median,
    /// Mean weighted by reliability score.
    ReliabilityWeighted,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::WeightedMean        => "weighted_mean",
            AggregationMethod::Mean                => "mean",
            AggregationMethod::Median              => "median",
            AggregationMethod::ReliabilityWeighted => "reliability_weighted",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub method: AggregationMethod,
    #[serde(default)]
    pub bounds: ValidityBounds,
}

pub struct Aggregator {
    method: AggregationMethod,
    bounds: ValidityBounds,
}

impl Aggregator {
    pub fn new(method: AggregationMethod, bounds: ValidityBounds) -> Self {
        Self { method, bounds }
    }

    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(config.method, config.bounds)
    }

    pub fn bounds(&self) -> &ValidityBounds {
        &self.bounds
    }

    /// Combine the valid sources. `sources` should already be in reliability
    /// order; that order is kept in the result.
    pub fn aggregate(&self, sources: Vec<RankedSource>) -> AggregateResult {
        let total = sources.len();
        let valid: Vec<RankedSource> = sources
            .into_iter()
            .filter(|s| s.candidate.is_valid_within(&self.bounds))
            .collect();

        if valid.len() < total {
            debug!(excluded = total - valid.len(), "Excluded invalid candidates from aggregation");
        }
        if valid.is_empty() {
            return AggregateResult::empty(self.method.as_str());
        }

        let values: Vec<f64> = valid.iter().filter_map(|s| s.candidate.value).collect();
        let confidences: Vec<f64> = valid.iter().map(|s| s.candidate.confidence).collect();

        let value = match self.method {
            AggregationMethod::WeightedMean => weighted_mean(
                valid.iter().filter_map(|s| s.candidate.value.map(|v| (v, s.candidate.confidence))),
            ),
            AggregationMethod::Mean => Some(mean(&values)),
            AggregationMethod::Median => median(&values),
            AggregationMethod::ReliabilityWeighted => weighted_mean(
                valid.iter().filter_map(|s| s.candidate.value.map(|v| (v, s.reliability_score))),
            )
            .or_else(|| Some(mean(&values))),
        };

        let Some(value) = value else {
            return AggregateResult::empty(self.method.as_str());
        };
        let confidence = (mean(&confidences) * disagreement_factor(&values)).clamp(0.0, 1.0);

        AggregateResult {
            value: Some(round2(value)),
            confidence,
            sources: valid,
            method: self.method.as_str().to_string(),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregationMethod::default(), ValidityBounds::default())
    }
}

/// Σ(v·w) / Σw; `None` when the weights sum to zero.
fn weighted_mean(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (num, den) = pairs.fold((0.0, 0.0), |(n, d), (v, w)| (n + v * w, d + w));
    if den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
