//! End-to-end CVintra estimation for one query term.
//!
//! CACHE_CHECK → FETCH → CLASSIFY → DEDUPLICATE → EXTRACT → RANK → AGGREGATE
//! → CACHE_WRITE → DONE. Every step of one query runs in sequence on the
//! caller's task.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use bioeq_cache::CacheLayer;
use bioeq_common::{
    AggregateResult, Estimate, EstimateOrigin, EstimateStatus, ExtractionCandidate, LiteratureRecord,
    StageTrace,
};
use bioeq_extract::{Extractor, ExtractorConfig};
use bioeq_ingestion::classify::classify;
use bioeq_ingestion::dedup::{deduplicate, DedupConfig};
use bioeq_ingestion::sources::{LiteratureSource, SecondarySource};
use bioeq_ingestion::typical::{StaticTypicalValues, TypicalValueTable};
use bioeq_ranker::{Aggregator, ReliabilityRanker};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

// ── Policy ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStep {
    Literature,
    Secondary,
    TypicalValue,
}

impl FallbackStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStep::Literature   => "literature",
            FallbackStep::Secondary    => "secondary",
            FallbackStep::TypicalValue => "typical_value",
        }
    }
}

/// Ordered evidence sources. The first step producing a value wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    pub steps: Vec<FallbackStep>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            steps: vec![FallbackStep::Literature, FallbackStep::Secondary, FallbackStep::TypicalValue],
        }
    }
}

impl FallbackPolicy {
    pub fn contains(&self, step: FallbackStep) -> bool {
        self.steps.contains(&step)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on the whole FETCH phase: every source step of one query
    /// shares this single deadline.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Search hits requested from the literature source.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Search hits fetched in full.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_secondary_limit")]
    pub secondary_limit: usize,
    #[serde(default = "default_typical_confidence")]
    pub typical_value_confidence: f64,
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

fn default_fetch_timeout()      -> u64 { 30 }
fn default_search_limit()       -> usize { 20 }
fn default_fetch_limit()        -> usize { 10 }
fn default_secondary_limit()    -> usize { 10 }
fn default_typical_confidence() -> f64 { 0.85 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            search_limit: default_search_limit(),
            fetch_limit: default_fetch_limit(),
            secondary_limit: default_secondary_limit(),
            typical_value_confidence: default_typical_confidence(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn check(&self) -> Option<String> {
        if self.fetch_timeout_secs == 0 {
            return Some("pipeline.fetch_timeout_secs must be > 0".into());
        }
        if self.search_limit == 0 || self.fetch_limit == 0 {
            return Some("pipeline.search_limit and pipeline.fetch_limit must be > 0".into());
        }
        if !(self.typical_value_confidence > 0.0 && self.typical_value_confidence <= 1.0) {
            return Some(format!(
                "pipeline.typical_value_confidence ({}) must be in (0, 1]",
                self.typical_value_confidence
            ));
        }
        if self.fallback.steps.is_empty() {
            return Some("pipeline.fallback.steps must not be empty".into());
        }
        let steps = &self.fallback.steps;
        if let Some(dup) = steps.iter().enumerate().find(|(i, s)| steps[..*i].contains(s)) {
            return Some(format!("pipeline.fallback.steps lists {} twice", dup.1.as_str()));
        }
        None
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Trace {
    stages: Vec<StageTrace>,
}

impl Trace {
    fn note(&mut self, stage: &str, outcome: &str, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(stage, outcome, %detail, "Pipeline stage");
        self.stages.push(StageTrace {
            stage: stage.to_string(),
            outcome: outcome.to_string(),
            detail,
        });
    }
}

/// Lowercase, trimmed, single-spaced: the cache key and reported term.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Record-cache key for secondary records, kept apart from primary ids.
pub fn secondary_key(source: &str, id: &str) -> String {
    format!("{source}:{id}")
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Orchestrator {
    literature: Option<Arc<dyn LiteratureSource>>,
    secondary: Option<Arc<dyn SecondarySource>>,
    typical: Arc<dyn TypicalValueTable>,
    extractor: Extractor,
    ranker: ReliabilityRanker,
    aggregator: Aggregator,
    dedup: DedupConfig,
    cache: Arc<CacheLayer>,
    config: PipelineConfig,
}

#[derive(Default)]
struct Tally {
    attempted: usize,
    failed: usize,
    examined: usize,
    stale_checked: bool,
}

/// Outcome of one evidence step.
enum StepOutcome {
    Found(AggregateResult, usize),
    Empty(usize),
    Failed,
    Skipped,
}

impl Orchestrator {
    /// Pattern-only extraction, default ranking and aggregation, no sources.
    pub fn new(cache: Arc<CacheLayer>, config: PipelineConfig) -> Self {
        Self {
            literature: None,
            secondary: None,
            typical: Arc::new(StaticTypicalValues::new()),
            extractor: Extractor::new(ExtractorConfig::default(), Default::default()),
            ranker: ReliabilityRanker::default(),
            aggregator: Aggregator::default(),
            dedup: DedupConfig::default(),
            cache,
            config,
        }
    }

    pub fn with_literature(mut self, source: Arc<dyn LiteratureSource>) -> Self {
        self.literature = Some(source);
        self
    }

    pub fn with_secondary(mut self, source: Arc<dyn SecondarySource>) -> Self {
        self.secondary = Some(source);
        self
    }

    pub fn with_typical_values(mut self, table: Arc<dyn TypicalValueTable>) -> Self {
        self.typical = table;
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_ranker(mut self, ranker: ReliabilityRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    /// Estimate CVintra for `term`. Per-query failures are reported in the
    /// returned status, never as an error.
    #[instrument(skip(self))]
    pub async fn estimate(&self, term: &str) -> Estimate {
        let mut trace = Trace::default();
        let key = normalize_term(term);
        if key.is_empty() {
            trace.note("validate", "error", "blank query term");
            return Estimate { trace: trace.stages, ..Estimate::error(term.trim(), "blank query term") };
        }

        // CACHE_CHECK
        if let Some(mut hit) = self.cache.queries.get(&key, self.cache.config().query_ttl()).await {
            info!(term = %key, value = ?hit.value, "Serving cached estimate");
            trace.note("cache_check", "hit", format!("generated_at {}", hit.generated_at));
            hit.trace = trace.stages;
            return hit;
        }
        trace.note("cache_check", "miss", "");

        let deadline = Instant::now() + self.config.fetch_timeout();
        let mut tally = Tally::default();

        for step in &self.config.fallback.steps {
            let origin = match step {
                FallbackStep::Literature => EstimateOrigin::Literature,
                FallbackStep::Secondary => EstimateOrigin::Secondary,
                FallbackStep::TypicalValue => {
                    if let Some(stale) = self.serve_stale(&key, &mut tally, &mut trace).await {
                        return stale;
                    }
                    match self.typical_value(&key, tally.examined, &mut trace) {
                        Some(estimate) => return estimate,
                        None => continue,
                    }
                }
            };
            match self.run_step(*step, &key, deadline, &mut trace).await {
                StepOutcome::Found(aggregate, record_count) => {
                    let mut estimate = Estimate::from_aggregate(&key, aggregate, record_count, origin);
                    self.write_cache(&key, &estimate, &mut trace).await;
                    trace.note("done", "found", step.as_str());
                    estimate.trace = trace.stages;
                    info!(term = %key, value = ?estimate.value, confidence = estimate.confidence, origin = step.as_str(), "Estimate found");
                    return estimate;
                }
                StepOutcome::Empty(n) => {
                    tally.attempted += 1;
                    tally.examined += n;
                }
                StepOutcome::Failed => {
                    tally.attempted += 1;
                    tally.failed += 1;
                }
                StepOutcome::Skipped => {}
            }
        }

        if let Some(stale) = self.serve_stale(&key, &mut tally, &mut trace).await {
            return stale;
        }

        trace.note("done", "not_found", "");
        info!(term = %key, "No CVintra estimate found");
        Estimate { record_count: tally.examined, trace: trace.stages, ..Estimate::not_found(&key) }
    }

    /// Expired cached estimate, served only when every evidence step attempted
    /// so far failed. Consulted at most once per query.
    async fn serve_stale(&self, key: &str, tally: &mut Tally, trace: &mut Trace) -> Option<Estimate> {
        if tally.stale_checked || tally.attempted == 0 || tally.failed < tally.attempted {
            return None;
        }
        tally.stale_checked = true;
        let Some(mut stale) = self.cache.queries.get_any(key).await else {
            trace.note("stale_cache", "miss", "");
            return None;
        };
        warn!(term = %key, "All sources failed, serving stale cached estimate");
        trace.note("stale_cache", "hit", format!("generated_at {}", stale.generated_at));
        trace.note("done", "found", "stale_cache");
        stale.stale = true;
        stale.origin = EstimateOrigin::StaleCache;
        stale.trace = std::mem::take(&mut trace.stages);
        Some(stale)
    }

    fn typical_value(&self, key: &str, examined: usize, trace: &mut Trace) -> Option<Estimate> {
        let Some(value) = self.typical.lookup(key) else {
            trace.note("typical_value", "empty", "no entry");
            return None;
        };
        trace.note("typical_value", "found", format!("{value}%"));
        trace.note("done", "found", "typical_value");
        info!(term = %key, value, "Using typical CVintra");
        Some(Estimate {
            status: EstimateStatus::Found,
            value: Some(value),
            confidence: self.config.typical_value_confidence,
            record_count: examined,
            origin: EstimateOrigin::TypicalValue,
            method: "typical_value".to_string(),
            trace: std::mem::take(&mut trace.stages),
            ..Estimate::not_found(key)
        })
    }

    async fn run_step(&self, step: FallbackStep, term: &str, deadline: Instant, trace: &mut Trace) -> StepOutcome {
        let stage = format!("fetch_{}", step.as_str());
        let timeout_secs = self.config.fetch_timeout_secs;

        let configured = match step {
            FallbackStep::Literature => self.literature.is_some(),
            FallbackStep::Secondary => self.secondary.is_some(),
            FallbackStep::TypicalValue => return StepOutcome::Skipped,
        };
        if !configured {
            trace.note(&stage, "skipped", "no source configured");
            return StepOutcome::Skipped;
        }
        if Instant::now() >= deadline {
            warn!(step = step.as_str(), timeout_secs, "Fetch deadline already passed");
            trace.note(&stage, "timeout", format!("fetch deadline of {timeout_secs}s already passed"));
            return StepOutcome::Failed;
        }

        let fetched = match (step, &self.literature, &self.secondary) {
            (FallbackStep::Literature, Some(source), _) => {
                tokio::time::timeout_at(deadline, self.fetch_literature(source.as_ref(), term)).await
            }
            (FallbackStep::Secondary, _, Some(source)) => {
                tokio::time::timeout_at(deadline, self.fetch_secondary(source.as_ref(), term)).await
            }
            _ => return StepOutcome::Skipped,
        };

        let records = match fetched {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(step = step.as_str(), error = %e, "Source unavailable");
                trace.note(&stage, "error", e.to_string());
                return StepOutcome::Failed;
            }
            Err(_) => {
                warn!(step = step.as_str(), timeout_secs, "Fetch deadline reached");
                trace.note(&stage, "timeout", format!("fetch deadline of {timeout_secs}s reached"));
                return StepOutcome::Failed;
            }
        };
        trace.note(&stage, "ok", format!("{} records", records.len()));
        if records.is_empty() {
            return StepOutcome::Empty(0);
        }

        let (aggregate, record_count) = self.evaluate(records, trace).await;
        if aggregate.is_empty() {
            StepOutcome::Empty(record_count)
        } else {
            StepOutcome::Found(aggregate, record_count)
        }
    }

    /// Search, then fetch up to `fetch_limit` records, consulting the record
    /// cache first. Individual fetch failures are skipped unless all fail.
    async fn fetch_literature(
        &self,
        source: &dyn LiteratureSource,
        term: &str,
    ) -> anyhow::Result<Vec<LiteratureRecord>> {
        let ids = source.search(term, self.config.search_limit).await?;
        debug!(source = source.name(), hits = ids.len(), "Literature search");

        let ttl = self.cache.config().record_ttl();
        let mut records = Vec::new();
        let mut last_err = None;
        for id in ids.iter().take(self.config.fetch_limit) {
            if let Some(cached) = self.cache.records.get(id, ttl).await {
                records.push(cached);
                continue;
            }
            match source.fetch(id).await {
                Ok(record) => {
                    self.cache.records.put(id, record.clone(), ttl).await;
                    records.push(record);
                }
                Err(e) => {
                    warn!(source = source.name(), record_id = %id, error = %e, "Record fetch failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if records.is_empty() => Err(e),
            _ => Ok(records),
        }
    }

    async fn fetch_secondary(
        &self,
        source: &dyn SecondarySource,
        term: &str,
    ) -> anyhow::Result<Vec<LiteratureRecord>> {
        let records = source.lookup(term, self.config.secondary_limit).await?;
        debug!(source = source.name(), count = records.len(), "Secondary lookup");
        let ttl = self.cache.config().record_ttl();
        for r in records.iter().filter(|r| !r.id.is_empty()) {
            self.cache.records.put(&secondary_key(source.name(), &r.id), r.clone(), ttl).await;
        }
        Ok(records)
    }

    /// CLASSIFY → DEDUPLICATE → EXTRACT → RANK → AGGREGATE over one batch.
    async fn evaluate(&self, records: Vec<LiteratureRecord>, trace: &mut Trace) -> (AggregateResult, usize) {
        let records: Vec<LiteratureRecord> = records
            .into_iter()
            .map(|r| match r.classification {
                Some(_) => r,
                None => {
                    let c = classify(&r);
                    r.with_classification(c)
                }
            })
            .collect();
        trace.note("classify", "ok", format!("{} records", records.len()));

        let before = records.len();
        let records = deduplicate(records, &self.dedup);
        trace.note("deduplicate", "ok", format!("{before} → {}", records.len()));

        let mut candidates: Vec<ExtractionCandidate> = Vec::new();
        for record in &records {
            candidates.extend(self.extract_cached(record).await);
        }
        let valid = candidates.iter().filter(|c| c.is_valid_within(self.aggregator.bounds())).count();
        trace.note("extract", "ok", format!("{} candidates, {valid} valid", candidates.len()));

        let ranked = self.ranker.rank_candidates(candidates, &records);
        trace.note("rank", "ok", format!("{} sources", ranked.len()));

        let aggregate = self.aggregator.aggregate(ranked);
        match aggregate.value {
            Some(v) => trace.note(
                "aggregate",
                "ok",
                format!("{v}% (confidence {:.2}, {} sources)", aggregate.confidence, aggregate.sources.len()),
            ),
            None => trace.note("aggregate", "empty", "no valid candidates"),
        }
        (aggregate, records.len())
    }

    async fn extract_cached(&self, record: &LiteratureRecord) -> Vec<ExtractionCandidate> {
        let ttl = self.cache.config().extraction_ttl();
        if !record.id.is_empty() {
            if let Some(hit) = self.cache.extractions.get(&record.id, ttl).await {
                return hit;
            }
        }
        let extraction = self.extractor.extract_record(record).await;
        if extraction.delegate_failed {
            debug!(record_id = %record.id, "Extraction incomplete, not cached");
        } else if !record.id.is_empty() {
            self.cache.extractions.put(&record.id, extraction.candidates.clone(), ttl).await;
        }
        extraction.candidates
    }

    async fn write_cache(&self, key: &str, estimate: &Estimate, trace: &mut Trace) {
        self.cache.queries.put(key, estimate.clone(), self.cache.config().query_ttl()).await;
        trace.note("cache_write", "ok", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  Acetyl   Salicylic Acid "), "acetyl salicylic acid");
        assert_eq!(normalize_term(" \t "), "");
    }

    #[test]
    fn test_default_policy_order() {
        let p = FallbackPolicy::default();
        assert_eq!(
            p.steps,
            vec![FallbackStep::Literature, FallbackStep::Secondary, FallbackStep::TypicalValue]
        );
    }

    #[test]
    fn test_pipeline_config_from_toml() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            fetch_timeout_secs = 5
            [fallback]
            steps = ["secondary", "typical_value"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.fallback.steps, vec![FallbackStep::Secondary, FallbackStep::TypicalValue]);
        assert_eq!(cfg.fetch_limit, 10);
        assert!(cfg.check().is_none());
    }

    #[test]
    fn test_pipeline_config_check() {
        let cfg = PipelineConfig { typical_value_confidence: 1.5, ..Default::default() };
        assert!(cfg.check().is_some());
        let cfg = PipelineConfig { fallback: FallbackPolicy { steps: vec![] }, ..Default::default() };
        assert!(cfg.check().is_some());
        let cfg = PipelineConfig {
            fallback: FallbackPolicy {
                steps: vec![FallbackStep::Literature, FallbackStep::TypicalValue, FallbackStep::Literature],
            },
            ..Default::default()
        };
        assert!(cfg.check().unwrap().contains("literature twice"));
        // Any order of distinct steps is accepted.
        let cfg = PipelineConfig {
            fallback: FallbackPolicy { steps: vec![FallbackStep::TypicalValue, FallbackStep::Literature] },
            ..Default::default()
        };
        assert!(cfg.check().is_none());
    }

    #[tokio::test]
    async fn test_blank_term_is_error() {
        let orch = Orchestrator::new(Arc::new(CacheLayer::in_memory()), PipelineConfig::default());
        let est = orch.estimate("   ").await;
        assert_eq!(est.status, EstimateStatus::Error);
        assert!(est.error.is_some());
        assert_eq!(est.value, None);
    }
}
