//! Frozen task catalog loaded from TOML
//!
//! The built-in suite ships inside the binary; `from_toml` exists so tests and
//! experiments can supply their own suite.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, StratloopError};

use super::spec::{Frequency, TaskSpec};

const BUILTIN_TASKS: &str = include_str!("tasks.toml");

#[derive(Debug, Deserialize)]
struct TomlBounds {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct TomlDefaults {
    universe: Vec<String>,
    frequency: Frequency,
    tools: Vec<String>,
    required_metrics: Vec<String>,
    costs_bps: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    seed: u64,
    max_leverage: f64,
}

#[derive(Debug, Deserialize)]
struct TomlUniverse {
    symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlTask {
    id: String,
    description: String,
    #[serde(default)]
    signal: String,
    #[serde(default)]
    rules: BTreeMap<String, String>,
    #[serde(default)]
    params: Map<String, Value>,
    frequency: Option<Frequency>,
    universe: Option<Vec<String>>,
    tools: Option<Vec<String>>,
    required_metrics: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalog {
    bounds: TomlBounds,
    defaults: TomlDefaults,
    universe: TomlUniverse,
    #[serde(rename = "task")]
    tasks: Vec<TomlTask>,
}

/// Inclusive date range for which price data exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DataBounds {
    pub fn contains(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start >= self.start && end <= self.end
    }
}

/// The frozen task suite with shared constraints.
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    bounds: DataBounds,
    universe: Vec<String>,
    default_tools: Vec<String>,
    tasks: Vec<TaskSpec>,
}

impl TaskCatalog {
    /// Load the suite compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_TASKS)
    }

    /// Load a suite from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: TomlCatalog = toml::from_str(content)
            .map_err(|e| StratloopError::Storage(format!("Failed to parse task catalog: {}", e)))?;

        let defaults = catalog.defaults;
        let mut tasks: Vec<TaskSpec> = Vec::with_capacity(catalog.tasks.len());
        for task in catalog.tasks {
            if tasks.iter().any(|t| t.task_id == task.id) {
                return Err(StratloopError::Storage(format!("Duplicate task id '{}' in catalog", task.id)));
            }
            tasks.push(TaskSpec {
                name: task.id.clone(),
                task_id: task.id,
                description: task.description,
                universe: task.universe.unwrap_or_else(|| defaults.universe.clone()),
                frequency: task.frequency.unwrap_or(defaults.frequency),
                signal: task.signal,
                rules: task.rules,
                tools: task.tools.unwrap_or_else(|| defaults.tools.clone()),
                required_metrics: task
                    .required_metrics
                    .unwrap_or_else(|| defaults.required_metrics.clone()),
                params: task.params,
                costs_bps: defaults.costs_bps,
                start_date: defaults.start_date,
                end_date: defaults.end_date,
                seed: defaults.seed,
                max_leverage: defaults.max_leverage,
            });
        }

        Ok(Self {
            bounds: DataBounds {
                start: catalog.bounds.start_date,
                end: catalog.bounds.end_date,
            },
            universe: catalog.universe.symbols,
            default_tools: defaults.tools,
            tasks,
        })
    }

    /// Template for a task id
    pub fn get(&self, task_id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Task ids in catalog order
    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.task_id.as_str()).collect()
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn bounds(&self) -> DataBounds {
        self.bounds
    }

    pub fn allowed_universe(&self) -> &[String] {
        &self.universe
    }

    pub fn is_allowed_symbol(&self, symbol: &str) -> bool {
        self.universe.iter().any(|s| s == symbol)
    }

    pub fn default_tools(&self) -> &[String] {
        &self.default_tools
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
