//! Live PubMed and Europe PMC lookups.
//!
//! Run with: NCBI_EMAIL=you@example.org cargo test --package bioeq-ingestion --test test_pubmed_ingestion -- --ignored --nocapture

use bioeq_ingestion::sources::europepmc::{EuropePmcClient, EuropePmcConfig};
use bioeq_ingestion::sources::pubmed::{PubMedClient, PubMedConfig};
use bioeq_ingestion::sources::{LiteratureSource, SecondarySource};

fn pubmed_config() -> PubMedConfig {
    PubMedConfig {
        email: Some(std::env::var("NCBI_EMAIL").unwrap_or_else(|_| "bioeq-tests@example.org".into())),
        api_key: std::env::var("NCBI_API_KEY").ok(),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_pubmed_search_and_fetch_aspirin() {
    let client = PubMedClient::new(&pubmed_config()).expect("client");

    let ids = client.search("aspirin", 5).await.expect("PubMed search failed");
    println!("Found {} PMIDs: {:?}", ids.len(), ids);
    assert!(!ids.is_empty(), "Should find at least one paper");

    let record = client.fetch(&ids[0]).await.expect("PubMed fetch failed");
    println!("Title: {}", record.title);
    println!("Year: {:?}", record.year);
    assert_eq!(record.id, ids[0]);
    assert!(!record.title.is_empty());
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_europepmc_lookup_metformin() {
    let client = EuropePmcClient::new(&EuropePmcConfig::default()).expect("client");
    let records = client.lookup("metformin", 5).await.expect("Europe PMC lookup failed");
    for r in &records {
        println!("{} ({:?}) {}", r.id, r.year, r.title);
    }
    assert!(records.len() <= 5);
}
