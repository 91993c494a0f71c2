//! Hybrid extractor: patterns first, semantic delegate as fallback.

use std::sync::Arc;

use bioeq_common::{ExtractionCandidate, ExtractionMethod, LiteratureRecord, ValidityBounds};
use bioeq_llm::SemanticDelegate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::delegate::{self, ConfidenceBand};
use crate::patterns;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// The delegate runs unless a valid pattern candidate reaches this confidence.
    #[serde(default = "default_delegate_threshold")]
    pub delegate_threshold: f64,
    #[serde(default = "default_delegate_max_chars")]
    pub delegate_max_chars: usize,
    #[serde(default)]
    pub delegate_confidence: ConfidenceBand,
    /// Percentage points within which a delegate value confirms a pattern value.
    #[serde(default = "default_agreement_tolerance")]
    pub agreement_tolerance: f64,
}

fn default_delegate_threshold()  -> f64 { 0.8 }
fn default_delegate_max_chars()  -> usize { 2000 }
fn default_agreement_tolerance() -> f64 { 1.0 }

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            delegate_threshold: default_delegate_threshold(),
            delegate_max_chars: default_delegate_max_chars(),
            delegate_confidence: ConfidenceBand::default(),
            agreement_tolerance: default_agreement_tolerance(),
        }
    }
}

impl ExtractorConfig {
    pub fn check(&self) -> Option<String> {
        if !(self.delegate_threshold > 0.0 && self.delegate_threshold <= 1.0) {
            return Some(format!("delegate_threshold ({}) must be in (0, 1]", self.delegate_threshold));
        }
        let band = &self.delegate_confidence;
        if !(0.0 <= band.floor && band.floor <= band.ceiling && band.ceiling <= 1.0) {
            return Some(format!(
                "delegate confidence band [{}, {}] must lie within [0, 1]",
                band.floor, band.ceiling
            ));
        }
        if self.delegate_max_chars == 0 {
            return Some("delegate_max_chars must be > 0".to_string());
        }
        None
    }
}

pub struct Extractor {
    config: ExtractorConfig,
    bounds: ValidityBounds,
    delegate: Option<Arc<dyn SemanticDelegate>>,
}

/// Candidates for one text, plus whether the delegate was needed but errored.
/// A run with `delegate_failed` set is incomplete and should not be cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub candidates: Vec<ExtractionCandidate>,
    pub delegate_failed: bool,
}

/// Delegate reply: parsed candidate, nothing usable, or a call error.
enum DelegateReply {
    Found(ExtractionCandidate),
    Nothing,
    Failed,
}

impl Extractor {
    pub fn new(config: ExtractorConfig, bounds: ValidityBounds) -> Self {
        Self { config, bounds, delegate: None }
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn SemanticDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Extract from a record's title and abstract.
    pub async fn extract_record(&self, record: &LiteratureRecord) -> Extraction {
        self.run(&record.text(), &record.id, &record.url).await
    }

    /// Candidates from `text`, highest confidence first. Never fails: delegate
    /// errors are logged and the pattern result stands.
    pub async fn extract(&self, text: &str, record_id: &str, source_url: &str) -> Vec<ExtractionCandidate> {
        self.run(text, record_id, source_url).await.candidates
    }

    async fn run(&self, text: &str, record_id: &str, source_url: &str) -> Extraction {
        if text.trim().is_empty() {
            return Extraction::default();
        }

        let mut candidates = patterns::pattern_candidates(text);
        let confident = candidates.iter().any(|c| {
            c.is_valid_within(&self.bounds) && c.confidence >= self.config.delegate_threshold
        });

        let mut delegate_failed = false;
        if !confident {
            match self.ask_delegate(text, record_id).await {
                DelegateReply::Found(found) => self.merge_delegate(&mut candidates, found),
                DelegateReply::Nothing => {}
                DelegateReply::Failed => delegate_failed = true,
            }
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Extraction {
            candidates: candidates
                .into_iter()
                .map(|c| c.with_provenance(record_id, source_url))
                .collect(),
            delegate_failed,
        }
    }

    async fn ask_delegate(&self, text: &str, record_id: &str) -> DelegateReply {
        let Some(delegate) = self.delegate.as_ref() else {
            return DelegateReply::Nothing;
        };
        let passage = delegate::truncate_chars(text, self.config.delegate_max_chars);
        match delegate.complete(delegate::INSTRUCTION, passage).await {
            Ok(reply) => {
                let parsed = delegate::parse_reply(&reply, passage, &self.config.delegate_confidence);
                debug!(record_id, found = parsed.is_some(), "Delegate extraction");
                parsed.map_or(DelegateReply::Nothing, DelegateReply::Found)
            }
            Err(e) => {
                warn!(record_id, error = %e, "Delegate extraction failed");
                DelegateReply::Failed
            }
        }
    }

    /// A delegate value agreeing with a pattern value confirms it instead of
    /// adding a second candidate.
    fn merge_delegate(&self, candidates: &mut Vec<ExtractionCandidate>, found: ExtractionCandidate) {
        let Some(dv) = found.value else { return };
        let agreeing = candidates.iter_mut().find(|c| {
            c.method == ExtractionMethod::Pattern
                && c.value.is_some_and(|pv| (pv - dv).abs() <= self.config.agreement_tolerance)
        });
        match agreeing {
            Some(c) => {
                c.method = ExtractionMethod::Combined;
                c.confidence = c.confidence.max(found.confidence);
            }
            None => candidates.push(found),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioeq_llm::MockDelegate;

    fn extractor(delegate: Option<Arc<MockDelegate>>) -> Extractor {
        let e = Extractor::new(ExtractorConfig::default(), ValidityBounds::default());
        match delegate {
            Some(d) => e.with_delegate(d),
            None => e,
        }
    }

    #[tokio::test]
    async fn test_confident_pattern_skips_delegate() {
        let mock = Arc::new(MockDelegate::new().with_reply(r#"{"cvintra": 40}"#));
        let e = extractor(Some(mock.clone()));
        let c = e.extract("The intra-subject CV: 15.2% for Cmax.", "123", "http://x/123").await;
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].value, Some(15.2));
        assert_eq!(c[0].record_id, "123");
        assert_eq!(c[0].source_url, "http://x/123");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delegate_fallback_when_no_pattern() {
        let text = "Variability within subjects reached 31% for Cmax.";
        let mock = Arc::new(MockDelegate::new().with_reply(
            r#"{"cvintra": 31, "confidence": 0.75, "evidence": "Variability within subjects reached 31% for Cmax."}"#,
        ));
        let c = extractor(Some(mock.clone())).extract(text, "9", "").await;
        assert_eq!(mock.call_count(), 1);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].method, ExtractionMethod::Delegate);
        assert_eq!(c[0].confidence, 0.75);
        assert!(c[0].is_valid());
    }

    #[tokio::test]
    async fn test_agreeing_delegate_marks_combined() {
        let text = "The intra-subject CV = 27, consistent with prior work.";
        let mock = Arc::new(MockDelegate::new().with_reply(
            r#"{"cvintra": 27.4, "confidence": 0.8, "evidence": "The intra-subject CV = 27"}"#,
        ));
        let c = extractor(Some(mock)).extract(text, "1", "").await;
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].method, ExtractionMethod::Combined);
        assert_eq!(c[0].value, Some(27.0));
        assert_eq!(c[0].confidence, 0.8);
    }

    #[tokio::test]
    async fn test_delegate_failure_keeps_pattern_result() {
        let text = "The intra-subject CV = 27, consistent with prior work.";
        let c = extractor(Some(Arc::new(MockDelegate::failing()))).extract(text, "1", "").await;
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].method, ExtractionMethod::Pattern);
        assert_eq!(c[0].confidence, 0.70);
    }

    #[tokio::test]
    async fn test_delegate_failure_is_reported() {
        let record = LiteratureRecord {
            id: "5".into(),
            title: "Tacrolimus exposure".into(),
            abstract_text: "Variability within subjects reached 31% for Cmax.".into(),
            year: Some(2020),
            authors: vec![],
            url: String::new(),
            source: "test".into(),
            classification: None,
        };
        let out = extractor(Some(Arc::new(MockDelegate::failing()))).extract_record(&record).await;
        assert!(out.delegate_failed);
        assert!(out.candidates.is_empty());

        // No delegate configured is not a failure.
        let out = extractor(None).extract_record(&record).await;
        assert!(!out.delegate_failed);

        // A confident pattern never consults the delegate, so nothing fails.
        let confident = LiteratureRecord { abstract_text: "Intra-subject CV: 15.2%".into(), ..record };
        let out = extractor(Some(Arc::new(MockDelegate::failing()))).extract_record(&confident).await;
        assert!(!out.delegate_failed);
        assert_eq!(out.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_no_delegate_no_pattern_is_empty() {
        assert!(extractor(None).extract("Nothing relevant here.", "1", "").await.is_empty());
        assert!(extractor(None).extract("   ", "1", "").await.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_pattern_does_not_block_delegate() {
        let mock = Arc::new(MockDelegate::new().with_reply(r#"{"cvintra": null}"#));
        let c = extractor(Some(mock.clone())).extract("intra-subject CV: 250%", "1", "").await;
        assert_eq!(mock.call_count(), 1);
        assert_eq!(c.len(), 1);
        assert!(!c[0].is_valid());
    }

    #[test]
    fn test_config_check() {
        assert!(ExtractorConfig::default().check().is_none());
        let bad = ExtractorConfig { delegate_threshold: 1.5, ..Default::default() };
        assert!(bad.check().is_some());
    }
}
