//! Date-aligned close prices for a symbol universe.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading date across every symbol of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    /// Closes in the table's symbol order, `None` where a symbol has no bar
    pub closes: Vec<Option<f64>>,
}

/// Close prices indexed by date with one column per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    symbols: Vec<String>,
    rows: Vec<PriceRow>,
}

impl PriceTable {
    /// Align per-symbol series on the union of their dates within `start..=end`.
    pub fn align(
        series: &[(String, &BTreeMap<NaiveDate, f64>)],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        let dates: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|(_, closes)| closes.range(start..=end).map(|(d, _)| *d))
            .collect();

        let rows = dates
            .into_iter()
            .map(|date| PriceRow {
                date,
                closes: series.iter().map(|(_, closes)| closes.get(&date).copied()).collect(),
            })
            .collect();

        Self {
            symbols: series.iter().map(|(s, _)| s.clone()).collect(),
            rows,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    /// Number of bars a symbol actually has
    pub fn observations(&self, symbol: &str) -> usize {
        match self.symbols.iter().position(|s| s == symbol) {
            Some(idx) => self.rows.iter().filter(|r| r.closes[idx].is_some()).count(),
            None => 0,
        }
    }
}
