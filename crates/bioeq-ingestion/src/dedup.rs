//! Near-duplicate collapsing for literature records.
//!
//! Titles are normalised, compared pairwise by token Jaccard similarity and
//! grouped transitively with union-find. Each group keeps its most recent
//! record.

use std::collections::HashSet;

use bioeq_common::LiteratureRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Pairs strictly above this similarity are merged.
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
}

fn default_threshold() -> f64 { 0.85 }

impl Default for DedupConfig {
    fn default() -> Self {
        Self { similarity_threshold: default_threshold() }
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard coefficient over whitespace tokens. Two empty titles are identical.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower index stays root so groups are anchored at first appearance.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Collapse near-duplicate records.
///
/// Within a group the record with the most recent year wins; ties go to the
/// earliest in input and a missing year ranks oldest. Survivors keep their
/// relative input order.
pub fn deduplicate(records: Vec<LiteratureRecord>, config: &DedupConfig) -> Vec<LiteratureRecord> {
    let n = records.len();
    if n < 2 {
        return records;
    }

    let titles: Vec<String> = records.iter().map(|r| normalize_title(&r.title)).collect();
    let mut sets = DisjointSet::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if jaccard(&titles[i], &titles[j]) > config.similarity_threshold {
                sets.union(i, j);
            }
        }
    }

    // best[root] = index of the representative chosen so far
    let mut best: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let root = sets.find(i);
        best[root] = match best[root] {
            None => Some(i),
            Some(cur) if year_rank(&records[i]) > year_rank(&records[cur]) => Some(i),
            keep => keep,
        };
    }

    let keep: HashSet<usize> = best.into_iter().flatten().collect();
    let removed = n - keep.len();
    if removed > 0 {
        debug!(removed, kept = keep.len(), "Collapsed near-duplicate records");
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, r)| r)
        .collect()
}

fn year_rank(record: &LiteratureRecord) -> i32 {
    record.year.unwrap_or(i32::MIN)
}
