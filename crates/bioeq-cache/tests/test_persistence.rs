//! Snapshot persistence across cache instances.

use std::time::Duration;

use bioeq_cache::{CacheConfig, CacheLayer};
use bioeq_common::{Estimate, EstimateOrigin, EstimateStatus, LiteratureRecord};
use pretty_assertions::assert_eq;

const HOUR: Duration = Duration::from_secs(3600);

fn config(dir: &std::path::Path) -> CacheConfig {
    CacheConfig { dir: Some(dir.to_path_buf()), ..Default::default() }
}

fn found(term: &str, value: f64) -> Estimate {
    Estimate {
        status: EstimateStatus::Found,
        value: Some(value),
        confidence: 0.9,
        origin: EstimateOrigin::Literature,
        ..Estimate::not_found(term)
    }
}

#[tokio::test]
async fn test_flush_then_open_restores_entries() {
    let dir = tempfile::tempdir().unwrap();

    let cache = CacheLayer::open(config(dir.path())).await.unwrap();
    let estimate = found("aspirin", 15.2);
    cache.queries.put("aspirin", estimate.clone(), HOUR).await;
    cache
        .records
        .put(
            "123",
            LiteratureRecord {
                id: "123".into(),
                title: "Aspirin BE".into(),
                abstract_text: "intra-subject CV: 15.2%".into(),
                year: Some(2021),
                authors: vec!["Smith J".into()],
                url: "https://pubmed.ncbi.nlm.nih.gov/123/".into(),
                source: "pubmed".into(),
                classification: None,
            },
            HOUR,
        )
        .await;
    cache.flush().await.unwrap();

    assert!(dir.path().join("queries.json").exists());
    assert!(dir.path().join("records.json").exists());
    assert!(dir.path().join("extractions.json").exists());

    let reopened = CacheLayer::open(config(dir.path())).await.unwrap();
    assert_eq!(reopened.queries.get("aspirin", HOUR).await, Some(estimate));
    assert_eq!(reopened.records.get_any("123").await.map(|r| r.year), Some(Some(2021)));
}

#[tokio::test]
async fn test_open_empty_dir_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheLayer::open(config(&dir.path().join("nested"))).await.unwrap();
    assert!(cache.queries.is_empty().await);
    assert!(cache.records.is_empty().await);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("queries.json"), b"{not json").unwrap();
    assert!(CacheLayer::open(config(dir.path())).await.is_err());
}

#[tokio::test]
async fn test_flush_overwrites_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheLayer::open(config(dir.path())).await.unwrap();
    cache.queries.put("a", found("a", 10.0), HOUR).await;
    cache.flush().await.unwrap();
    cache.purge(Duration::ZERO).await;
    cache.flush().await.unwrap();

    let reopened = CacheLayer::open(config(dir.path())).await.unwrap();
    assert!(reopened.queries.is_empty().await);
}
