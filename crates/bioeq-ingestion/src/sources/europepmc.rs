//! Europe PMC REST API client, used as the secondary source.
//!
//! Endpoint: https://www.ebi.ac.uk/europepmc/webservices/rest/search

use std::time::Duration;

use async_trait::async_trait;
use bioeq_common::{BioeqError, LiteratureRecord};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::pacing::RequestPacer;
use super::SecondarySource;

const EPMC_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EuropePmcConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_enabled()         -> bool { true }
fn default_interval_ms()     -> u64 { 200 }
fn default_request_timeout() -> u64 { 30 }

impl Default for EuropePmcConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_interval_ms: default_interval_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

pub struct EuropePmcClient {
    client: Client,
    pacer: RequestPacer,
}

impl EuropePmcClient {
    pub fn new(config: &EuropePmcConfig) -> Result<Self, BioeqError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("bioeq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BioeqError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            pacer: RequestPacer::new(Duration::from_millis(config.min_interval_ms)),
        })
    }
}

#[async_trait]
impl SecondarySource for EuropePmcClient {
    fn name(&self) -> &str {
        "europepmc"
    }

    #[instrument(skip(self))]
    async fn lookup(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<LiteratureRecord>> {
        let query = format!("{term} AND (\"intra-subject\" OR \"within-subject\" OR bioequivalence)");
        let page_size = max_results.to_string();
        let params = [
            ("query", query.as_str()),
            ("resultType", "core"),
            ("pageSize", page_size.as_str()),
            ("format", "json"),
        ];

        self.pacer.wait().await;
        let resp = self.client
            .get(EPMC_SEARCH_URL)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let records = parse_search_response(&resp);
        debug!(count = records.len(), "Europe PMC search returned results");
        Ok(records)
    }
}

/// Map `resultList.result[]` into records. Entries without a title are skipped;
/// year and authors stay empty when absent.
pub fn parse_search_response(resp: &serde_json::Value) -> Vec<LiteratureRecord> {
    let results = resp["resultList"]["result"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    results
        .iter()
        .filter_map(|r| {
            let title = r["title"].as_str().unwrap_or("").trim().to_string();
            if title.is_empty() {
                return None;
            }
            let id = r["pmid"]
                .as_str()
                .or_else(|| r["id"].as_str())
                .unwrap_or("")
                .to_string();
            let source_db = r["source"].as_str().unwrap_or("MED");

            let authors = r["authorList"]["author"]
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter_map(|a| a["fullName"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();

            Some(LiteratureRecord {
                url: format!("https://europepmc.org/article/{}/{}", source_db, id),
                id,
                title,
                abstract_text: r["abstractText"].as_str().unwrap_or("").to_string(),
                year: r["pubYear"].as_str().and_then(|y| y.trim().parse().ok()),
                authors,
                source: "europepmc".to_string(),
                classification: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let json = serde_json::json!({
            "resultList": {"result": [
                {
                    "id": "31234567", "source": "MED", "pmid": "31234567",
                    "title": "Within-subject variability of metformin",
                    "abstractText": "The within-subject CV was 21.5%.",
                    "pubYear": "2019",
                    "authorList": {"author": [{"fullName": "Doe J"}]}
                },
                {"id": "PPR1", "source": "PPR", "title": "Preprint without year"},
                {"id": "X", "title": ""}
            ]}
        });
        let records = parse_search_response(&json);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].year, Some(2019));
        assert_eq!(records[0].authors, vec!["Doe J".to_string()]);
        assert_eq!(records[0].url, "https://europepmc.org/article/MED/31234567");
        assert_eq!(records[1].id, "PPR1");
        assert_eq!(records[1].year, None);
        assert!(records[1].authors.is_empty());
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_search_response(&serde_json::json!({})).is_empty());
    }
}
