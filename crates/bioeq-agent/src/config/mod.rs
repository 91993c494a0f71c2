//! Configuration loading for bioeq.
//! Reads bioeq.toml from the current directory or the path in BIOEQ_CONFIG.
//! Secrets may also come from the environment (or a `.env` file).

use std::collections::HashMap;
use std::path::Path;

use bioeq_cache::CacheConfig;
use bioeq_common::BioeqError;
use bioeq_extract::ExtractorConfig;
use bioeq_ingestion::dedup::DedupConfig;
use bioeq_ingestion::sources::europepmc::EuropePmcConfig;
use bioeq_ingestion::sources::pubmed::PubMedConfig;
use bioeq_llm::LlmConfig;
use bioeq_ranker::{AggregationConfig, ReliabilityWeights};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{FallbackStep, PipelineConfig};

pub const CONFIG_ENV: &str = "BIOEQ_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "bioeq.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pubmed: PubMedConfig,
    #[serde(default)]
    pub secondary: EuropePmcConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub extraction: ExtractorConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub ranking: ReliabilityWeights,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Term → typical CVintra (%), merged over the built-in table.
    #[serde(default)]
    pub typical_values: HashMap<String, f64>,
}

mod tests;

impl AppConfig {
    /// Load configuration from bioeq.toml.
    /// Checks BIOEQ_CONFIG first, then the current directory. A missing
    /// default file yields built-in defaults; a missing explicit path is an error.
    pub fn load() -> Result<Self, BioeqError> {
        let _ = dotenvy::dotenv();

        let explicit = std::env::var(CONFIG_ENV).ok();
        let path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            debug!(path = %path, "Loaded config file");
            Self::from_toml_str(&content)?
        } else if explicit.is_some() {
            return Err(BioeqError::config(format!("Config file not found: {path}")));
        } else {
            debug!("No bioeq.toml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|k| std::env::var(k).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BioeqError> {
        Ok(toml::from_str(content)?)
    }

    /// Secrets from the environment replace file values. Blank variables are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("NCBI_API_KEY") {
            self.pubmed.api_key = Some(key);
        }
        if let Some(email) = get("NCBI_EMAIL") {
            self.pubmed.email = Some(email);
        }
        if let Some(key) = get("BIOEQ_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), BioeqError> {
        if self.pipeline.fallback.contains(FallbackStep::Literature) {
            self.pubmed.validate()?;
        }
        if !self.ranking.validate() {
            return Err(BioeqError::config(format!(
                "ranking weights must be non-negative and sum to 1.0 (got {:?})",
                self.ranking.as_array()
            )));
        }
        let problems = [
            self.aggregation.bounds.check().map(|p| format!("aggregation.bounds: {p}")),
            self.extraction.check().map(|p| format!("extraction: {p}")),
            self.pipeline.check(),
        ];
        if let Some(p) = problems.into_iter().flatten().next() {
            return Err(BioeqError::config(p));
        }
        let t = self.dedup.similarity_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(BioeqError::config(format!(
                "dedup.similarity_threshold ({t}) must be in (0, 1]"
            )));
        }
        if let Some((term, v)) = self
            .typical_values
            .iter()
            .find(|(_, v)| !self.aggregation.bounds.in_range(**v))
        {
            return Err(BioeqError::config(format!(
                "typical_values.{term} ({v}) is outside the accepted CVintra range"
            )));
        }
        Ok(())
    }
}
