//! Literature source clients.

pub mod pacing;
pub mod pubmed;
pub mod europepmc;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bioeq_common::LiteratureRecord;

/// Primary literature collaborator: search for ids, then fetch each record.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Short name used in logs and on produced records.
    fn name(&self) -> &str;

    /// Search for records matching a drug term, returns record identifiers.
    async fn search(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<String>>;

    /// Fetch one full record by identifier.
    async fn fetch(&self, record_id: &str) -> anyhow::Result<LiteratureRecord>;
}

/// Fallback collaborator consulted only when the literature source yields nothing.
/// Records may be partial (no year, no authors).
#[async_trait]
pub trait SecondarySource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<LiteratureRecord>>;
}

// ── Mock Implementations for Testing ───────────────────────────────────────

/// In-memory literature source. Every search returns all records whose text
/// mentions the term; `failing()` makes every call error.
#[derive(Default)]
pub struct MockLiteratureSource {
    records: Vec<LiteratureRecord>,
    fail: bool,
    fetches: AtomicUsize,
}

impl MockLiteratureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: LiteratureRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Number of successful `fetch` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiteratureSource for MockLiteratureSource {
    fn name(&self) -> &str {
        "mock-literature"
    }

    async fn search(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<String>> {
        if self.fail {
            anyhow::bail!("mock literature source unreachable");
        }
        let term = term.to_lowercase();
        Ok(self
            .records
            .iter()
            .filter(|r| r.text().to_lowercase().contains(&term))
            .take(max_results)
            .map(|r| r.id.clone())
            .collect())
    }

    async fn fetch(&self, record_id: &str) -> anyhow::Result<LiteratureRecord> {
        if self.fail {
            anyhow::bail!("mock literature source unreachable");
        }
        let record = self
            .records
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown record {record_id}"))?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

/// In-memory secondary source keyed by lowercase term.
#[derive(Default)]
pub struct MockSecondarySource {
    data: HashMap<String, Vec<LiteratureRecord>>,
    fail: bool,
}

impl MockSecondarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, term: &str, record: LiteratureRecord) -> Self {
        self.data.entry(term.to_lowercase()).or_default().push(record);
        self
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }
}

#[async_trait]
impl SecondarySource for MockSecondarySource {
    fn name(&self) -> &str {
        "mock-secondary"
    }

    async fn lookup(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<LiteratureRecord>> {
        if self.fail {
            anyhow::bail!("mock secondary source unreachable");
        }
        Ok(self
            .data
            .get(&term.to_lowercase())
            .map(|v| v.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }
}
