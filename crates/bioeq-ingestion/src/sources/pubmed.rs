//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi

use std::time::Duration;

use async_trait::async_trait;
use bioeq_common::{BioeqError, LiteratureRecord};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::pacing::RequestPacer;
use super::LiteratureSource;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL:  &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
const ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedConfig {
    /// NCBI API key; raises the request quota.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Contact address NCBI requires from E-utilities clients.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_tool")]
    pub tool: String,
    /// Terms OR-ed together and AND-ed with the drug name.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_keyed_interval_ms")]
    pub keyed_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_tool()              -> String { "bioeq".to_string() }
fn default_keywords()          -> Vec<String> {
    ["pharmacokinetics", "bioequivalence", "Cmax", "AUC"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_interval_ms()       -> u64 { 340 }
fn default_keyed_interval_ms() -> u64 { 100 }
fn default_request_timeout()   -> u64 { 30 }

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            email: None,
            tool: default_tool(),
            keywords: default_keywords(),
            min_interval_ms: default_interval_ms(),
            keyed_interval_ms: default_keyed_interval_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PubMedConfig {
    pub fn validate(&self) -> Result<(), BioeqError> {
        match self.email.as_deref().map(str::trim) {
            Some(e) if e.contains('@') => {}
            _ => {
                return Err(BioeqError::config(
                    "pubmed.email is required by NCBI E-utilities (set it in bioeq.toml or NCBI_EMAIL)",
                ))
            }
        }
        Ok(())
    }
}

pub struct PubMedClient {
    client: Client,
    api_key: Option<SecretString>,
    email: String,
    tool: String,
    keywords: Vec<String>,
    pacer: RequestPacer,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> Result<Self, BioeqError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(format!("{}/{}", config.tool, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BioeqError::config(format!("Failed to build HTTP client: {e}")))?;

        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let pacer = RequestPacer::for_credentials(
            api_key.is_some(),
            Duration::from_millis(config.min_interval_ms),
            Duration::from_millis(config.keyed_interval_ms),
        );
        debug!(interval_ms = pacer.interval().as_millis() as u64, "PubMed request pacing");

        Ok(Self {
            client,
            api_key,
            email: config.email.clone().unwrap_or_default(),
            tool: config.tool.clone(),
            keywords: config.keywords.clone(),
            pacer,
        })
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("tool", self.tool.clone()),
            ("email", self.email.clone()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.expose_secret().to_string()));
        }
        params
    }

    /// `<drug> AND (kw1 OR kw2 ...)`
    pub fn build_query(&self, term: &str) -> String {
        build_query(term, &self.keywords)
    }
}

pub fn build_query(term: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        return term.to_string();
    }
    format!("{} AND ({})", term, keywords.join(" OR "))
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    fn name(&self) -> &str {
        "pubmed"
    }

    #[instrument(skip(self))]
    async fn search(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<String>> {
        let mut params = self.base_params();
        params.push(("term", self.build_query(term)));
        params.push(("retmax", max_results.to_string()));
        params.push(("retmode", "json".to_string()));
        params.push(("sort", "relevance".to_string()));

        self.pacer.wait().await;
        let resp: serde_json::Value = self.client
            .get(ESEARCH_URL)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ids = parse_esearch_ids(&resp);
        debug!(?ids, "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, record_id: &str) -> anyhow::Result<LiteratureRecord> {
        let mut params = self.base_params();
        params.push(("id", record_id.to_string()));
        params.push(("rettype", "abstract".to_string()));
        params.push(("retmode", "xml".to_string()));

        self.pacer.wait().await;
        let xml = self.client
            .get(EFETCH_URL)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_pubmed_xml(&xml)?
            .into_iter()
            .find(|r| r.id == record_id)
            .ok_or_else(|| anyhow::anyhow!("PMID {record_id} missing from efetch response"))
    }
}

fn parse_esearch_ids(resp: &serde_json::Value) -> Vec<String> {
    resp["esearchresult"]["idlist"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse PubMed XML (efetch abstract mode) into records.
/// Handles the <PubmedArticleSet><PubmedArticle> structure.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<LiteratureRecord>, BioeqError> {
    let mut records = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<LiteratureRecord> = None;
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut in_pmid       = false;
    let mut in_title      = false;
    let mut in_abstract   = false;
    let mut in_author     = false;
    let mut in_last_name  = false;
    let mut in_initials   = false;
    let mut in_pub_date   = false;
    let mut in_year       = false;
    let mut in_medline_dt = false;
    let mut current_last  = String::new();
    let mut current_init  = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                match e.name().as_ref() {
                    b"PubmedArticle" => {
                        abstract_parts.clear();
                        current = Some(LiteratureRecord {
                            id: String::new(),
                            title: String::new(),
                            abstract_text: String::new(),
                            year: None,
                            authors: vec![],
                            url: String::new(),
                            source: "pubmed".to_string(),
                            classification: None,
                        });
                    }
                    // Only the first PMID belongs to the article itself.
                    b"PMID" => {
                        in_pmid = current.as_ref().map(|r| r.id.is_empty()).unwrap_or(false);
                    }
                    b"ArticleTitle" => in_title = true,
                    b"AbstractText" => {
                        in_abstract = true;
                        abstract_parts.push(String::new());
                    }
                    b"Author"      => { in_author = true; current_last.clear(); current_init.clear(); }
                    b"LastName"    => in_last_name = true,
                    b"Initials"    => in_initials = true,
                    b"PubDate"     => in_pub_date = true,
                    b"Year"        => in_year = in_pub_date,
                    b"MedlineDate" => in_medline_dt = in_pub_date,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| BioeqError::Xml(err.to_string()))?
                    .to_string();
                if let Some(ref mut r) = current {
                    if in_pmid      { r.id = text.clone(); }
                    if in_title     { push_fragment(&mut r.title, &text); }
                    if in_abstract  {
                        if let Some(part) = abstract_parts.last_mut() {
                            push_fragment(part, &text);
                        }
                    }
                    if in_last_name { current_last = text.clone(); }
                    if in_initials  { current_init = text.clone(); }
                    if (in_year || in_medline_dt) && r.year.is_none() {
                        r.year = parse_year(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"PMID"         => in_pmid = false,
                    b"ArticleTitle" => in_title = false,
                    b"AbstractText" => in_abstract = false,
                    b"LastName"     => in_last_name = false,
                    b"Initials"     => in_initials = false,
                    b"PubDate"      => in_pub_date = false,
                    b"Year"         => in_year = false,
                    b"MedlineDate"  => in_medline_dt = false,
                    b"Author" => {
                        if in_author {
                            if let Some(ref mut r) = current {
                                if !current_last.is_empty() {
                                    let name = if current_init.is_empty() {
                                        current_last.clone()
                                    } else {
                                        format!("{} {}", current_last, current_init)
                                    };
                                    r.authors.push(name);
                                }
                            }
                            in_author = false;
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(mut r) = current.take() {
                            r.abstract_text = abstract_parts
                                .iter()
                                .filter(|p| !p.is_empty())
                                .cloned()
                                .collect::<Vec<_>>()
                                .join(" ");
                            if r.id.is_empty() || r.title.is_empty() {
                                warn!(pmid = %r.id, "Skipping PubMed article without PMID or title");
                            } else {
                                r.url = format!("{}/{}/", ARTICLE_URL, r.id);
                                records.push(r);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

/// Inline markup (<i>, <sub>) splits text events; rejoin with single spaces.
fn push_fragment(target: &mut String, fragment: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(fragment);
}

/// First four-digit run in a PubDate field ("2019", "2019 Jan-Feb").
fn parse_year(text: &str) -> Option<i32> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|tok| tok.len() == 4)
        .and_then(|tok| tok.parse().ok())
}
