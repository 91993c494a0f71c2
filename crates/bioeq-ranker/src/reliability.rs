//! Provenance-quality scoring of extraction candidates.
//!
//! R = Σ(w_i × f_i) over five factor scores, each in [0, 1]. Unknown
//! classification or year falls to the lowest tier of that factor.

use std::collections::HashMap;

use bioeq_common::{
    ArticleKind, ExtractionCandidate, ExtractionMethod, LiteratureRecord, RankedSource, SubjectKind,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::weights::ReliabilityWeights;

pub fn article_kind_score(kind: Option<ArticleKind>) -> f64 {
    match kind {
        Some(ArticleKind::Trial)         => 1.0,
        Some(ArticleKind::Observational) => 0.8,
        Some(ArticleKind::Review)        => 0.7,
        Some(ArticleKind::Methodology)   => 0.6,
        Some(ArticleKind::Other) | None  => 0.5,
    }
}

pub fn subject_kind_score(kind: Option<SubjectKind>) -> f64 {
    match kind {
        Some(SubjectKind::Human)          => 1.0,
        Some(SubjectKind::Animal)         => 0.5,
        Some(SubjectKind::InVitro) | None => 0.3,
    }
}

pub fn method_score(method: ExtractionMethod) -> f64 {
    match method {
        ExtractionMethod::Combined => 0.9,
        ExtractionMethod::Pattern  => 0.8,
        ExtractionMethod::Delegate => 0.7,
    }
}

/// 1.0 − 0.02 per elapsed year, floored at 0. Unknown year scores 0.
pub fn recency_score(year: Option<i32>, current_year: i32) -> f64 {
    match year {
        Some(y) => {
            let elapsed = (current_year - y).max(0) as f64;
            (1.0 - 0.02 * elapsed).max(0.0)
        }
        None => 0.0,
    }
}

/// Per-factor scores for one source, all in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub article_kind: f64,
    pub subject_kind: f64,
    pub method: f64,
    pub confidence: f64,
    pub recency: f64,
}

impl FactorScores {
    pub fn of(source: &RankedSource, current_year: i32) -> Self {
        Self {
            article_kind: article_kind_score(source.article_kind),
            subject_kind: subject_kind_score(source.subject_kind),
            method:       method_score(source.candidate.method),
            confidence:   source.candidate.confidence.clamp(0.0, 1.0),
            recency:      recency_score(source.year, current_year),
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.article_kind, self.subject_kind, self.method, self.confidence, self.recency]
    }
}

/// Weighted reliability score in [0, 1].
pub fn reliability_score(factors: &FactorScores, weights: &ReliabilityWeights) -> f64 {
    factors
        .as_array()
        .iter()
        .zip(weights.as_array().iter())
        .map(|(f, w)| f * w)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

pub struct ReliabilityRanker {
    weights: ReliabilityWeights,
    current_year: i32,
}

impl ReliabilityRanker {
    pub fn new(weights: ReliabilityWeights) -> Self {
        Self { weights, current_year: Utc::now().year() }
    }

    /// Pin the reference year for recency.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Score every source and sort descending; equal scores keep input order.
    pub fn rank(&self, sources: Vec<RankedSource>) -> Vec<RankedSource> {
        let mut scored: Vec<RankedSource> = sources
            .into_iter()
            .map(|mut s| {
                s.reliability_score = reliability_score(&FactorScores::of(&s, self.current_year), &self.weights);
                s
            })
            .collect();
        scored.sort_by(|a, b| b.reliability_score.total_cmp(&a.reliability_score));
        scored
    }

    /// Attach each candidate to its originating record (by id), then rank.
    pub fn rank_candidates(
        &self,
        candidates: Vec<ExtractionCandidate>,
        records: &[LiteratureRecord],
    ) -> Vec<RankedSource> {
        let by_id: HashMap<&str, &LiteratureRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        let sources = candidates
            .into_iter()
            .map(|c| {
                let record = by_id.get(c.record_id.as_str()).copied();
                RankedSource::from_record(c, record)
            })
            .collect();
        self.rank(sources)
    }
}

impl Default for ReliabilityRanker {
    fn default() -> Self {
        Self::new(ReliabilityWeights::default())
    }
}
