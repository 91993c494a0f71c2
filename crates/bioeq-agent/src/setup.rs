//! Wiring of configured collaborators into an `Orchestrator`.

use std::sync::Arc;

use bioeq_cache::CacheLayer;
use bioeq_extract::Extractor;
use bioeq_ingestion::sources::europepmc::EuropePmcClient;
use bioeq_ingestion::sources::pubmed::PubMedClient;
use bioeq_ingestion::typical::StaticTypicalValues;
use bioeq_llm::LlmDelegate;
use bioeq_ranker::{Aggregator, ReliabilityRanker};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::pipeline::{FallbackStep, Orchestrator};

/// Build the orchestrator for a validated config. The PubMed client is only
/// constructed when the literature step is part of the fallback policy.
pub fn build_orchestrator(config: &AppConfig, cache: Arc<CacheLayer>) -> anyhow::Result<Orchestrator> {
    let mut extractor = Extractor::new(config.extraction.clone(), config.aggregation.bounds);
    match config.llm.build_backend()? {
        Some(backend) => {
            info!(model = backend.model_id(), "Semantic delegate enabled");
            let delegate = LlmDelegate::new(backend).with_max_tokens(config.llm.max_tokens);
            extractor = extractor.with_delegate(Arc::new(delegate));
        }
        None => info!("No LLM backend configured, extraction uses patterns only"),
    }

    let typical = StaticTypicalValues::builtin()
        .with_overrides(config.typical_values.iter().map(|(k, v)| (k.clone(), *v)));

    let mut orchestrator = Orchestrator::new(cache, config.pipeline.clone())
        .with_typical_values(Arc::new(typical))
        .with_extractor(extractor)
        .with_ranker(ReliabilityRanker::new(config.ranking.clone()))
        .with_aggregator(Aggregator::from_config(&config.aggregation))
        .with_dedup(config.dedup.clone());

    if config.pipeline.fallback.contains(FallbackStep::Literature) {
        orchestrator = orchestrator.with_literature(Arc::new(PubMedClient::new(&config.pubmed)?));
    } else {
        info!("Literature step not in fallback policy, PubMed client not built");
    }

    if config.secondary.enabled && config.pipeline.fallback.contains(FallbackStep::Secondary) {
        orchestrator = orchestrator.with_secondary(Arc::new(EuropePmcClient::new(&config.secondary)?));
    } else {
        warn!("Secondary source disabled");
    }

    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioeq_common::EstimateOrigin;

    #[tokio::test]
    async fn test_no_email_needed_without_literature_step() {
        let config = AppConfig::from_toml_str(
            r#"
            [secondary]
            enabled = false
            [pipeline.fallback]
            steps = ["secondary", "typical_value"]
            "#,
        )
        .unwrap();
        assert!(config.pubmed.email.is_none());
        assert!(config.validate().is_ok());

        let orch = build_orchestrator(&config, Arc::new(CacheLayer::in_memory())).unwrap();
        let est = orch.estimate("aspirin").await;
        assert_eq!(est.origin, EstimateOrigin::TypicalValue);
        assert!(est.trace.iter().all(|t| t.stage != "fetch_literature"));
    }

    #[test]
    fn test_literature_step_still_requires_email() {
        let config = AppConfig::default();
        assert!(build_orchestrator(&config, Arc::new(CacheLayer::in_memory())).is_err());
    }
}
