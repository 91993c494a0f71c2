//! Data model shared by every stage of the estimation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence::ValidityBounds;

// ---------------------------------------------------------------------------
// Literature
// ---------------------------------------------------------------------------

/// Study design inferred from a record's title and abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleKind {
    Trial,
    Review,
    Observational,
    Methodology,
    Other,
}

impl ArticleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleKind::Trial         => "trial",
            ArticleKind::Review        => "review",
            ArticleKind::Observational => "observational",
            ArticleKind::Methodology   => "methodology",
            ArticleKind::Other         => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Human,
    Animal,
    InVitro,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Human   => "human",
            SubjectKind::Animal  => "animal",
            SubjectKind::InVitro => "in_vitro",
        }
    }
}

/// Derived classification. `subject_kind` is `None` when the text carries no cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub article_kind: ArticleKind,
    pub subject_kind: Option<SubjectKind>,
}

/// A single literature abstract plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureRecord {
    /// Opaque identifier (PMID for PubMed, source id for Europe PMC).
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    pub year: Option<i32>,
    pub authors: Vec<String>,
    pub url: String,
    /// Name of the collaborator that produced the record.
    pub source: String,
    #[serde(default)]
    pub classification: Option<Classification>,
}

impl LiteratureRecord {
    /// Title and abstract joined, the text every extractor sees.
    pub fn text(&self) -> String {
        match (self.title.is_empty(), self.abstract_text.is_empty()) {
            (true, _)      => self.abstract_text.clone(),
            (false, true)  => self.title.clone(),
            (false, false) => format!("{} {}", self.title, self.abstract_text),
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn article_kind(&self) -> Option<ArticleKind> {
        self.classification.map(|c| c.article_kind)
    }

    pub fn subject_kind(&self) -> Option<SubjectKind> {
        self.classification.and_then(|c| c.subject_kind)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Pattern,
    Delegate,
    /// Pattern value confirmed by the delegate.
    Combined,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Pattern  => "pattern",
            ExtractionMethod::Delegate => "delegate",
            ExtractionMethod::Combined => "combined",
        }
    }
}

/// One numeric CVintra guess extracted from one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    /// Percent. `None` when a delegate reply carried no usable number.
    pub value: Option<f64>,
    pub confidence: f64,
    pub method: ExtractionMethod,
    /// Verbatim text supporting the value.
    pub evidence: String,
    pub record_id: String,
    pub source_url: String,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionCandidate {
    pub fn new(value: f64, confidence: f64, method: ExtractionMethod) -> Self {
        Self {
            value: Some(value),
            confidence,
            method,
            evidence: String::new(),
            record_id: String::new(),
            source_url: String::new(),
            extracted_at: Utc::now(),
        }
    }

    pub fn with_provenance(mut self, record_id: &str, source_url: &str) -> Self {
        self.record_id = record_id.to_string();
        self.source_url = source_url.to_string();
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    /// Validity under the default bounds (5–100 %, confidence > 0.3).
    pub fn is_valid(&self) -> bool {
        self.is_valid_within(&ValidityBounds::default())
    }

    pub fn is_valid_within(&self, bounds: &ValidityBounds) -> bool {
        match self.value {
            Some(v) => bounds.accepts(v, self.confidence),
            None => false,
        }
    }
}

/// A candidate enriched with provenance quality, ready for display and weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSource {
    #[serde(flatten)]
    pub candidate: ExtractionCandidate,
    pub reliability_score: f64,
    pub article_kind: Option<ArticleKind>,
    pub subject_kind: Option<SubjectKind>,
    pub year: Option<i32>,
}

impl RankedSource {
    /// Unscored source carrying the record's classification.
    pub fn from_record(candidate: ExtractionCandidate, record: Option<&LiteratureRecord>) -> Self {
        Self {
            candidate,
            reliability_score: 0.0,
            article_kind: record.and_then(|r| r.article_kind()),
            subject_kind: record.and_then(|r| r.subject_kind()),
            year: record.and_then(|r| r.year),
        }
    }

    /// Unscored source with no classification at all.
    pub fn bare(candidate: ExtractionCandidate) -> Self {
        Self::from_record(candidate, None)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub value: Option<f64>,
    pub confidence: f64,
    /// Contributing sources, descending reliability.
    pub sources: Vec<RankedSource>,
    pub method: String,
}

impl AggregateResult {
    pub fn empty(method: impl Into<String>) -> Self {
        Self { value: None, confidence: 0.0, sources: Vec::new(), method: method.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    Found,
    NotFound,
    Error,
}

/// Where the reported value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateOrigin {
    Literature,
    Secondary,
    StaleCache,
    TypicalValue,
    None,
}

/// One visited pipeline stage and how it ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: String,
    pub outcome: String,
    pub detail: String,
}

/// Payload returned by `estimate(term)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub run_id: Uuid,
    pub term: String,
    pub status: EstimateStatus,
    pub value: Option<f64>,
    pub confidence: f64,
    pub sources: Vec<RankedSource>,
    pub record_count: usize,
    pub origin: EstimateOrigin,
    pub method: String,
    /// Served from an expired cache entry because every source failed.
    pub stale: bool,
    pub error: Option<String>,
    pub trace: Vec<StageTrace>,
    pub generated_at: DateTime<Utc>,
}

impl Estimate {
    pub fn not_found(term: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            term: term.to_string(),
            status: EstimateStatus::NotFound,
            value: None,
            confidence: 0.0,
            sources: Vec::new(),
            record_count: 0,
            origin: EstimateOrigin::None,
            method: "none".to_string(),
            stale: false,
            error: None,
            trace: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn error(term: &str, message: impl Into<String>) -> Self {
        Self {
            status: EstimateStatus::Error,
            error: Some(message.into()),
            ..Self::not_found(term)
        }
    }

    /// Found estimate from aggregated literature evidence.
    pub fn from_aggregate(
        term: &str,
        aggregate: AggregateResult,
        record_count: usize,
        origin: EstimateOrigin,
    ) -> Self {
        let status = if aggregate.value.is_some() {
            EstimateStatus::Found
        } else {
            EstimateStatus::NotFound
        };
        Self {
            status,
            value: aggregate.value,
            confidence: aggregate.confidence,
            sources: aggregate.sources,
            record_count,
            origin,
            method: aggregate.method,
            ..Self::not_found(term)
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == EstimateStatus::Found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, abstract_text: &str) -> LiteratureRecord {
        LiteratureRecord {
            id: "1".into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            year: Some(2020),
            authors: vec![],
            url: String::new(),
            source: "test".into(),
            classification: None,
        }
    }

    #[test]
    fn test_validity_bounds() {
        let ok = ExtractionCandidate::new(20.0, 0.9, ExtractionMethod::Pattern);
        assert!(ok.is_valid());
        assert!(!ExtractionCandidate::new(4.9, 0.9, ExtractionMethod::Pattern).is_valid());
        assert!(!ExtractionCandidate::new(100.1, 0.9, ExtractionMethod::Pattern).is_valid());
        // Confidence threshold is exclusive.
        assert!(!ExtractionCandidate::new(20.0, 0.3, ExtractionMethod::Pattern).is_valid());
        let mut missing = ok.clone();
        missing.value = None;
        assert!(!missing.is_valid());
    }

    #[test]
    fn test_record_text_joins_title_and_abstract() {
        assert_eq!(record("Title", "Body").text(), "Title Body");
        assert_eq!(record("", "Body").text(), "Body");
        assert_eq!(record("Title", "").text(), "Title");
    }

    #[test]
    fn test_estimate_from_empty_aggregate_is_not_found() {
        let est = Estimate::from_aggregate("x", AggregateResult::empty("weighted_mean"), 3, EstimateOrigin::Literature);
        assert_eq!(est.status, EstimateStatus::NotFound);
        assert_eq!(est.record_count, 3);
    }

    #[test]
    fn test_ranked_source_serializes_flat() {
        let src = RankedSource::bare(ExtractionCandidate::new(12.0, 0.8, ExtractionMethod::Delegate));
        let json = serde_json::to_value(&src).unwrap();
        assert_eq!(json["value"], 12.0);
        assert_eq!(json["method"], "delegate");
    }
}
