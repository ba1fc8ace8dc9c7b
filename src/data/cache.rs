//! On-disk per-symbol price cache.
//!
//! One JSON file per symbol under `<cache_dir>/<namespace>/`. Each file
//! records the date range it was filled for, so a window inside that range
//! never goes back to the supplier even when it contains no trading days.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::DataError;

/// Closes for one symbol plus the range they were fetched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSeries {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub closes: BTreeMap<NaiveDate, f64>,
}

impl CachedSeries {
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= start && self.end >= end
    }
}

/// Namespaced directory of cached series.
#[derive(Debug, Clone)]
pub struct SeriesCache {
    root: PathBuf,
}

impl SeriesCache {
    pub fn new(cache_dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            root: cache_dir.as_ref().join(namespace),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{}.json", symbol))
    }

    /// Read a symbol's series. Unreadable or corrupt files count as a miss.
    pub fn read(&self, symbol: &str) -> Option<CachedSeries> {
        let path = self.path(symbol);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedSeries>(&content) {
            Ok(series) if series.symbol == symbol => Some(series),
            Ok(_) => {
                warn!("Cache file {} holds a different symbol, ignoring", path.display());
                None
            }
            Err(e) => {
                warn!("Corrupt cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write a series atomically.
    ///
    /// The payload goes to a temp file in the same directory and is renamed
    /// over the target, so readers see either the old file or the new one.
    pub fn write(&self, series: &CachedSeries) -> Result<(), DataError> {
        fs::create_dir_all(&self.root)?;
        let payload = serde_json::to_vec(series).map_err(|e| DataError::Cache(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(&series.symbol))
            .map_err(|e| DataError::Cache(format!("failed to persist {}: {}", series.symbol, e)))?;
        Ok(())
    }
}
