//! Canonical task specification produced by the guard.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bar frequency a strategy trades at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    /// Parse a frequency name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            _ => None,
        }
    }

    pub fn periods_per_year(&self) -> f64 {
        match self {
            Frequency::Daily => 252.0,
            Frequency::Weekly => 52.0,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully validated strategy task.
///
/// Built once per run and never mutated afterwards. Anything that varies
/// between attempts (the seed, the repair hint) is derived from it instead
/// of written back into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    pub name: String,
    pub description: String,
    pub universe: Vec<String>,
    pub frequency: Frequency,
    pub signal: String,
    pub rules: BTreeMap<String, String>,
    pub tools: Vec<String>,
    pub required_metrics: Vec<String>,
    pub params: Map<String, Value>,
    pub costs_bps: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub seed: u64,
    pub max_leverage: f64,
}

impl TaskSpec {
    /// Seed handed to the generator for a given 1-based attempt.
    pub fn seed_for_attempt(&self, attempt: u32) -> u64 {
        self.seed.wrapping_add(u64::from(attempt.saturating_sub(1)))
    }

    /// Number of calendar days covered by the window.
    pub fn window_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Pretty JSON used in prompts and by the execution harness.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
