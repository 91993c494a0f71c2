//! Weight vector for evidence reliability scoring.

use serde::{Deserialize, Serialize};

/// The 5-component reliability weight vector.
/// Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityWeights {
    /// Study design (trial > observational > review > methodology > other)
    #[serde(default = "default_article_kind")]
    pub article_kind: f64,
    /// Subjects (human > animal > in vitro)
    #[serde(default = "default_subject_kind")]
    pub subject_kind: f64,
    /// Extraction method (combined > pattern > delegate)
    #[serde(default = "default_method")]
    pub method: f64,
    /// Extractor's own confidence
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Publication recency
    #[serde(default = "default_recency")]
    pub recency: f64,
}

fn default_article_kind() -> f64 { 0.35 }
fn default_subject_kind() -> f64 { 0.25 }
fn default_method()       -> f64 { 0.20 }
fn default_confidence()   -> f64 { 0.15 }
fn default_recency()      -> f64 { 0.05 }

impl Default for ReliabilityWeights {
    fn default() -> Self {
        Self {
            article_kind: default_article_kind(),
            subject_kind: default_subject_kind(),
            method:       default_method(),
            confidence:   default_confidence(),
            recency:      default_recency(),
        }
    }
}

impl ReliabilityWeights {
    fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Validate that all weights are non-negative and sum to ~1.0
    pub fn validate(&self) -> bool {
        self.as_array().iter().all(|w| *w >= 0.0) && (self.sum() - 1.0).abs() < 1e-6
    }

    /// Renormalise weights so they sum to 1.0
    pub fn normalise(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.article_kind /= sum;
            self.subject_kind /= sum;
            self.method       /= sum;
            self.confidence   /= sum;
            self.recency      /= sum;
        }
    }

    /// Convert to array for iteration, in the order of [`crate::reliability::FactorScores::as_array`].
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.article_kind,
            self.subject_kind,
            self.method,
            self.confidence,
            self.recency,
        ]
    }
}
