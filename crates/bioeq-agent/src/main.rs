//! bioeq — CVintra estimation and bioequivalence design recommendation.
//!
//! Usage:
//!   bioeq <drug> [<drug> ...]   estimate each term, print JSON per term
//!   bioeq purge                 drop cache entries older than the retention window

use std::sync::Arc;

use anyhow::Context;
use bioeq_agent::config::AppConfig;
use bioeq_agent::design::{recommend_design, AdministrationMode};
use bioeq_agent::setup::build_orchestrator;
use bioeq_cache::CacheLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bioeq=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: bioeq <drug> [<drug> ...] | bioeq purge");
        std::process::exit(2);
    }

    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("invalid configuration")?;

    let cache = Arc::new(CacheLayer::open(config.cache.clone()).await?);

    if args.len() == 1 && args[0] == "purge" {
        let report = cache.purge_retention().await;
        info!(
            records = report.records,
            extractions = report.extractions,
            queries = report.queries,
            "Cache purge complete"
        );
        cache.flush().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let orchestrator = build_orchestrator(&config, cache.clone())?;

    for term in &args {
        let estimate = orchestrator.estimate(term).await;
        let design = recommend_design(estimate.value, AdministrationMode::Fasted);
        let out = serde_json::json!({ "estimate": estimate, "design": design });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    cache.flush().await?;
    Ok(())
}
