//! Cache-first price loading.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info};

use super::cache::{CachedSeries, SeriesCache};
use super::supplier::PriceSupplier;
use super::table::PriceTable;
use super::DataError;

/// Serves price tables from the cache, filling gaps from the supplier.
pub struct DataLoader {
    cache: SeriesCache,
    supplier: Arc<dyn PriceSupplier>,
    fetch_timeout: Duration,
}

impl DataLoader {
    pub fn new(cache: SeriesCache, supplier: Arc<dyn PriceSupplier>, fetch_timeout: Duration) -> Self {
        Self {
            cache,
            supplier,
            fetch_timeout,
        }
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    /// Closes for `symbols` over `start..=end`, aligned by date.
    ///
    /// Symbols already covered by the cache are read from disk; the rest are
    /// fetched once, over the union of the cached and requested range, and
    /// written back. Repeating a call never fetches again.
    pub async fn load_series(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, DataError> {
        if start > end {
            return Err(DataError::EmptyWindow { start, end });
        }

        let mut loaded: Vec<(String, CachedSeries)> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let series = match self.cache.read(symbol) {
                Some(cached) if cached.covers(start, end) => {
                    debug!("Cache hit for {} {}..{}", symbol, start, end);
                    cached
                }
                previous => self.fill(symbol, previous, start, end).await?,
            };

            if series.closes.range(start..=end).next().is_none() {
                return Err(DataError::MissingSymbol {
                    symbol: symbol.clone(),
                    start,
                    end,
                });
            }
            loaded.push((symbol.clone(), series));
        }

        let columns: Vec<(String, &_)> = loaded.iter().map(|(s, series)| (s.clone(), &series.closes)).collect();
        let table = PriceTable::align(&columns, start, end);
        if table.is_empty() {
            return Err(DataError::EmptyWindow { start, end });
        }
        Ok(table)
    }

    async fn fill(
        &self,
        symbol: &str,
        previous: Option<CachedSeries>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CachedSeries, DataError> {
        let (fetch_start, fetch_end) = match &previous {
            Some(p) => (p.start.min(start), p.end.max(end)),
            None => (start, end),
        };

        info!(
            "Fetching {} {}..{} from {}",
            symbol,
            fetch_start,
            fetch_end,
            self.supplier.name()
        );
        let closes = tokio::time::timeout(self.fetch_timeout, self.supplier.fetch(symbol, fetch_start, fetch_end))
            .await
            .map_err(|_| DataError::Timeout {
                symbol: symbol.to_string(),
                ms: self.fetch_timeout.as_millis() as u64,
            })??;

        let mut series = CachedSeries {
            symbol: symbol.to_string(),
            start: fetch_start,
            end: fetch_end,
            closes: previous.map(|p| p.closes).unwrap_or_default(),
        };
        // Another loader may have written this symbol while we were fetching
        if let Some(latest) = self.cache.read(symbol) {
            merge_concurrent(&mut series, latest);
        }
        series.closes.extend(closes);

        self.cache.write(&series)?;
        Ok(series)
    }
}

/// Fold a series written by someone else into ours. The covered range only
/// widens when the two ranges overlap or touch, so no unfetched gap is claimed.
fn merge_concurrent(series: &mut CachedSeries, latest: CachedSeries) {
    let touches = latest.start <= series.end.succ_opt().unwrap_or(series.end)
        && series.start <= latest.end.succ_opt().unwrap_or(latest.end);
    if touches {
        debug!(
            "Merging concurrent cache entry for {} {}..{}",
            series.symbol, latest.start, latest.end
        );
        series.start = series.start.min(latest.start);
        series.end = series.end.max(latest.end);
    }
    series.closes.extend(latest.closes);
}
