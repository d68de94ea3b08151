// =============================================================================
// cache.rs — ONE JSON FILE PER REPORT
// =============================================================================
//
// Scraping a report costs a browser context and a good minute of clicking.
// Once we have its numbers we keep them on disk for an hour. The file's
// modification time is the only timestamp we need.
//
// Older deployments wrote a bare JSON array of numbers. Those files still
// load; they are read as 100% complete.
// =============================================================================

use serde::Deserialize;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::debug;

use crate::models::ReportData;

/// Progress assumed for cache files that don't record one.
const LEGACY_PROGRESS: &str = "100%";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The two payload shapes found on disk.
#[derive(Deserialize)]
#[serde(untagged)]
enum CachePayload {
    Bare(Vec<String>),
    Full {
        #[serde(default)]
        numbers: Option<Vec<String>>,
        #[serde(default)]
        progress: Option<String>,
    },
}

impl From<CachePayload> for ReportData {
    fn from(payload: CachePayload) -> Self {
        match payload {
            CachePayload::Bare(numbers) => ReportData::new(numbers, LEGACY_PROGRESS),
            CachePayload::Full { numbers, progress } => ReportData {
                numbers: numbers.unwrap_or_default().into_iter().collect::<BTreeSet<_>>(),
                progress: progress
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| LEGACY_PROGRESS.to_string()),
            },
        }
    }
}

/// Per-report disk cache with a time-to-live.
#[derive(Debug, Clone)]
pub struct ReportCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ReportCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a report's numbers live.
    pub fn path_for(&self, report_id: &str) -> PathBuf {
        self.dir.join(format!("report_{report_id}_numbers.json"))
    }

    /// Recover the report id from a cache file name.
    pub fn report_id_from_path(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let id = name.strip_prefix("report_")?.strip_suffix("_numbers.json")?;
        (!id.is_empty()).then(|| id.to_string())
    }

    /// True when a cache file exists and is younger than the TTL.
    pub async fn is_valid(&self, report_id: &str) -> bool {
        self.is_valid_at(report_id, SystemTime::now()).await
    }

    pub async fn is_valid_at(&self, report_id: &str, now: SystemTime) -> bool {
        match self.modified(report_id).await {
            Some(modified) => self.fresh(modified, now),
            None => false,
        }
    }

    /// Last write time of a report's cache file, if there is one.
    pub async fn modified(&self, report_id: &str) -> Option<SystemTime> {
        let metadata = tokio::fs::metadata(self.path_for(report_id)).await.ok()?;
        metadata.modified().ok()
    }

    fn fresh(&self, modified: SystemTime, now: SystemTime) -> bool {
        // A file from the future (clock skew) counts as brand new.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        age < self.ttl
    }

    /// Serialize `data` over whatever was cached before.
    pub async fn write(&self, report_id: &str, data: &ReportData) -> Result<PathBuf, CacheError> {
        let path = self.path_for(report_id);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let json = serde_json::to_vec_pretty(data).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(report_id = report_id, path = %path.display(), numbers = data.numbers.len(), "Cached report");
        Ok(path)
    }

    pub async fn read(&self, report_id: &str) -> Result<ReportData, CacheError> {
        Self::read_path(&self.path_for(report_id)).await
    }

    /// Load any cache file, old or new shape.
    pub async fn read_path(path: &Path) -> Result<ReportData, CacheError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let payload: CachePayload =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(payload.into())
    }
}
