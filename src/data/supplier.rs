//! Historical price suppliers.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::DataError;

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";
const ADJUSTED_CLOSE_KEY: &str = "5. adjusted close";

/// Source of daily closes for a single symbol.
#[async_trait]
pub trait PriceSupplier: Send + Sync {
    /// Closes for `symbol` within `start..=end`, inclusive on both ends.
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>, DataError>;

    fn name(&self) -> &str;
}

/// Alpha Vantage daily adjusted series.
pub struct AlphaVantageSupplier {
    client: Client,
    api_key: String,
}

impl AlphaVantageSupplier {
    pub fn from_env(api_key_env: &str, timeout: Duration) -> Result<Self, DataError> {
        let api_key = std::env::var(api_key_env).map_err(|_| DataError::Supplier {
            symbol: "*".to_string(),
            message: format!("environment variable {} not set", api_key_env),
        })?;
        Self::with_api_key(api_key, timeout)
    }

    pub fn with_api_key(api_key: String, timeout: Duration) -> Result<Self, DataError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| DataError::Supplier {
            symbol: "*".to_string(),
            message: format!("failed to create HTTP client: {}", e),
        })?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl PriceSupplier for AlphaVantageSupplier {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>, DataError> {
        let supplier_err = |message: String| DataError::Supplier {
            symbol: symbol.to_string(),
            message,
        };

        debug!("Fetching {} from Alpha Vantage", symbol);
        let response = self
            .client
            .get(ALPHA_VANTAGE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY_ADJUSTED"),
                ("symbol", symbol),
                ("outputsize", "full"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| supplier_err(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(supplier_err(format!("HTTP {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| supplier_err(format!("invalid JSON: {}", e)))?;

        parse_alpha_vantage(symbol, &body, start, end)
    }

    fn name(&self) -> &str {
        "alpha_vantage"
    }
}

impl std::fmt::Debug for AlphaVantageSupplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageSupplier").finish_non_exhaustive()
    }
}

/// Pull adjusted closes within the window out of a daily-adjusted payload.
pub fn parse_alpha_vantage(
    symbol: &str,
    body: &Value,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeMap<NaiveDate, f64>, DataError> {
    let supplier_err = |message: String| DataError::Supplier {
        symbol: symbol.to_string(),
        message,
    };

    for key in ["Error Message", "Note", "Information"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            return Err(supplier_err(msg.to_string()));
        }
    }

    let series = body
        .get("Time Series (Daily)")
        .and_then(Value::as_object)
        .ok_or_else(|| supplier_err("payload has no daily series".to_string()))?;

    let mut closes = BTreeMap::new();
    for (raw_date, bar) in series {
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| supplier_err(format!("bad date '{}'", raw_date)))?;
        if date < start || date > end {
            continue;
        }
        let close = bar
            .get(ADJUSTED_CLOSE_KEY)
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| supplier_err(format!("no adjusted close on {}", raw_date)))?;
        closes.insert(date, close);
    }
    Ok(closes)
}
