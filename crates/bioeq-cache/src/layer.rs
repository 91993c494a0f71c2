//! The three cache namespaces used by the estimation pipeline, with optional
//! JSON snapshot persistence.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bioeq_common::{Estimate, ExtractionCandidate, LiteratureRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use crate::store::CacheStore;

const DAY_SECS: u64 = 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshot directory; `None` keeps the cache in memory only.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Max age of a whole-query result served as fresh.
    #[serde(default = "default_query_ttl")]
    pub query_ttl_secs: u64,
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,
    #[serde(default = "default_record_ttl")]
    pub extraction_ttl_secs: u64,
    /// `purge` removes entries at least this old.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

fn default_query_ttl()  -> u64 { DAY_SECS }
fn default_record_ttl() -> u64 { 30 * DAY_SECS }
fn default_retention()  -> u64 { 30 * DAY_SECS }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            query_ttl_secs: default_query_ttl(),
            record_ttl_secs: default_record_ttl(),
            extraction_ttl_secs: default_record_ttl(),
            retention_secs: default_retention(),
        }
    }
}

impl CacheConfig {
    pub fn query_ttl(&self) -> Duration {
        Duration::from_secs(self.query_ttl_secs)
    }

    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }

    pub fn extraction_ttl(&self) -> Duration {
        Duration::from_secs(self.extraction_ttl_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

/// Counts removed per namespace by one purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub records: usize,
    pub extractions: usize,
    pub queries: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.records + self.extractions + self.queries
    }
}

pub struct CacheLayer {
    pub records: CacheStore<LiteratureRecord>,
    pub extractions: CacheStore<Vec<ExtractionCandidate>>,
    pub queries: CacheStore<Estimate>,
    config: CacheConfig,
}

impl CacheLayer {
    /// Empty in-memory cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            records: CacheStore::new("records"),
            extractions: CacheStore::new("extractions"),
            queries: CacheStore::new("queries"),
            config,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Load snapshots from `config.dir` when set. Missing files start empty.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        let layer = Self::new(config);
        if let Some(dir) = layer.config.dir.clone() {
            tokio::fs::create_dir_all(&dir).await?;
            load_into(&layer.records, &dir).await?;
            load_into(&layer.extractions, &dir).await?;
            load_into(&layer.queries, &dir).await?;
            info!(
                dir = %dir.display(),
                records = layer.records.len().await,
                queries = layer.queries.len().await,
                "Opened cache snapshot"
            );
        }
        Ok(layer)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Write every namespace to its snapshot file. No-op without a directory.
    pub async fn flush(&self) -> Result<()> {
        let Some(dir) = self.config.dir.as_deref() else {
            return Ok(());
        };
        write_snapshot(&self.records, dir).await?;
        write_snapshot(&self.extractions, dir).await?;
        write_snapshot(&self.queries, dir).await?;
        debug!(dir = %dir.display(), "Flushed cache snapshot");
        Ok(())
    }

    /// Purge all namespaces of entries at least `older_than` old.
    pub async fn purge(&self, older_than: Duration) -> PurgeReport {
        PurgeReport {
            records: self.records.purge(older_than).await,
            extractions: self.extractions.purge(older_than).await,
            queries: self.queries.purge(older_than).await,
        }
    }

    /// Purge with the configured retention window.
    pub async fn purge_retention(&self) -> PurgeReport {
        self.purge(self.config.retention()).await
    }
}

fn snapshot_path<T>(store: &CacheStore<T>, dir: &Path) -> PathBuf
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    dir.join(format!("{}.json", store.name()))
}

async fn load_into<T>(store: &CacheStore<T>, dir: &Path) -> Result<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    let path = snapshot_path(store, dir);
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let entries: Vec<CacheEntry<T>> = serde_json::from_slice(&bytes)?;
    store.restore(entries).await;
    Ok(())
}

/// Write to a temp file in the same directory, then rename over the target.
async fn write_snapshot<T>(store: &CacheStore<T>, dir: &Path) -> Result<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    let path = snapshot_path(store, dir);
    let bytes = serde_json::to_vec_pretty(&store.snapshot().await)?;
    let dir = dir.to_path_buf();
    let target = path.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| CacheError::Persist {
            path: target.display().to_string(),
            reason: e.error.to_string(),
        })?;
        Ok(())
    })
    .await
    .map_err(|e| CacheError::Persist {
        path: path.display().to_string(),
        reason: format!("snapshot writer task failed: {e}"),
    })?
}
