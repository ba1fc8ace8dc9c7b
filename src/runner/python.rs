//! Subprocess executor for Python strategy modules.
//!
//! Every call gets a fresh temporary directory holding the candidate, the
//! dataset, the spec and a small harness script. The directory is removed
//! when the call returns, on every path.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::process::Command;

use crate::config::ExecutorConfig;
use crate::data::PriceTable;
use crate::task::TaskSpec;

use super::executor::{ExecutionFault, StrategyExecutor, StrategyOutput};

const HARNESS: &str = include_str!("harness.py");
const RESULT_MARKER: &str = "__STRATLOOP_RESULT__";
const TRACEBACK_TAIL_LINES: usize = 6;

/// CPython refuses to start when `PYTHONHASHSEED` exceeds `u32::MAX`
fn hash_seed(seed: u64) -> u32 {
    (seed % (1u64 << 32)) as u32
}

#[derive(Serialize)]
struct PricesPayload<'a> {
    symbols: &'a [String],
    dates: Vec<String>,
    closes: Vec<&'a [Option<f64>]>,
}

/// Float on the wire: non-finite values travel as null or "inf"/"-inf".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireFloat {
    Num(f64),
    Text(String),
}

fn unwire(value: Option<WireFloat>) -> f64 {
    match value {
        Some(WireFloat::Num(v)) => v,
        Some(WireFloat::Text(s)) => match s.as_str() {
            "inf" => f64::INFINITY,
            "-inf" => f64::NEG_INFINITY,
            _ => f64::NAN,
        },
        None => f64::NAN,
    }
}

#[derive(Debug, Deserialize)]
struct HarnessReply {
    ok: bool,
    #[serde(default)]
    returns: Vec<(String, Option<WireFloat>)>,
    turnover: Option<WireFloat>,
    #[serde(default)]
    diagnostics: BTreeMap<String, Option<WireFloat>>,
    error: Option<String>,
    traceback: Option<String>,
}

/// Runs candidates with a Python interpreter.
#[derive(Debug, Clone)]
pub struct PythonExecutor {
    python_bin: String,
    timeout: Duration,
    toolkit_root: PathBuf,
}

impl PythonExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            python_bin: config.python_bin.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            toolkit_root: config.toolkit_root.clone(),
        }
    }

    fn stage(&self, dir: &TempDir, source: &str, dataset: &PriceTable, spec: &TaskSpec) -> Result<(), ExecutionFault> {
        let payload = PricesPayload {
            symbols: dataset.symbols(),
            dates: dataset.rows().iter().map(|r| r.date.to_string()).collect(),
            closes: dataset.rows().iter().map(|r| r.closes.as_slice()).collect(),
        };
        let prices = serde_json::to_vec(&payload).map_err(|e| ExecutionFault::Process(e.to_string()))?;
        let spec_json = serde_json::to_vec(spec).map_err(|e| ExecutionFault::Process(e.to_string()))?;

        fs::write(dir.path().join("candidate.py"), source)?;
        fs::write(dir.path().join("prices.json"), prices)?;
        fs::write(dir.path().join("spec.json"), spec_json)?;
        fs::write(dir.path().join("harness.py"), HARNESS)?;
        Ok(())
    }
}

#[async_trait]
impl StrategyExecutor for PythonExecutor {
    async fn execute(
        &self,
        source: &str,
        dataset: &PriceTable,
        spec: &TaskSpec,
        seed: u64,
    ) -> Result<StrategyOutput, ExecutionFault> {
        let dir = TempDir::new()?;
        self.stage(&dir, source, dataset, spec)?;

        let mut cmd = Command::new(&self.python_bin);
        cmd.arg(dir.path().join("harness.py"))
            .arg(dir.path())
            .arg(seed.to_string())
            .current_dir(dir.path())
            .env("PYTHONPATH", &self.toolkit_root)
            .env("PYTHONHASHSEED", hash_seed(seed).to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Executing candidate for {} (seed {}) in {}",
            spec.task_id,
            seed,
            dir.path().display()
        );
        let child = cmd.spawn()?;
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(ExecutionFault::Timeout(self.timeout.as_millis() as u64)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match parse_reply(&stdout)? {
            Some(reply) => reply_to_output(reply),
            None => Err(ExecutionFault::Process(format!(
                "exit status {:?} without a result: {}",
                output.status.code(),
                tail(stderr.trim(), TRACEBACK_TAIL_LINES)
            ))),
        }
    }
}

fn parse_reply(stdout: &str) -> Result<Option<HarnessReply>, ExecutionFault> {
    match stdout.lines().rev().find_map(|l| l.strip_prefix(RESULT_MARKER)) {
        Some(json) => serde_json::from_str(json)
            .map(Some)
            .map_err(|e| ExecutionFault::Malformed(e.to_string())),
        None => Ok(None),
    }
}

fn reply_to_output(reply: HarnessReply) -> Result<StrategyOutput, ExecutionFault> {
    if !reply.ok {
        let mut message = reply.error.unwrap_or_else(|| "unknown error".to_string());
        if let Some(tb) = reply.traceback.as_deref() {
            message.push('\n');
            message.push_str(&tail(tb.trim(), TRACEBACK_TAIL_LINES));
        }
        return Err(ExecutionFault::Raised(message));
    }

    let mut returns = Vec::with_capacity(reply.returns.len());
    for (raw_date, value) in reply.returns {
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
            .map_err(|_| ExecutionFault::Malformed(format!("bad return date '{}'", raw_date)))?;
        returns.push((date, unwire(value)));
    }

    Ok(StrategyOutput {
        returns,
        turnover: unwire(reply.turnover),
        diagnostics: reply.diagnostics.into_iter().map(|(k, v)| (k, unwire(v))).collect(),
    })
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{SpecGuard, TaskCatalog, TaskRequest};
    use std::sync::Arc;

    #[test]
    fn test_parse_reply_takes_last_marker_line() {
        let stdout = format!(
            "debug print\n{m}{{\"ok\": false, \"error\": \"old\"}}\nmore\n{m}{{\"ok\": true, \"returns\": [[\"2020-01-02\", 0.01]], \"turnover\": 0.2}}\n",
            m = RESULT_MARKER
        );
        let reply = parse_reply(&stdout).unwrap().unwrap();
        assert!(reply.ok);
        let output = reply_to_output(reply).unwrap();
        assert_eq!(output.returns, vec![(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), 0.01)]);
        assert_eq!(output.turnover, 0.2);
    }

    #[test]
    fn test_parse_reply_absent() {
        assert!(parse_reply("Traceback...\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_reply_malformed() {
        let stdout = format!("{}{{not json", RESULT_MARKER);
        assert!(matches!(parse_reply(&stdout), Err(ExecutionFault::Malformed(_))));
    }

    #[test]
    fn test_raised_reply_carries_traceback_tail() {
        let stdout = format!(
            "{}{}",
            RESULT_MARKER,
            r#"{"ok": false, "error": "ZeroDivisionError: division by zero", "traceback": "Traceback:\n  File \"candidate.py\", line 7\n    x = 1 / 0\nZeroDivisionError: division by zero"}"#
        );
        let reply = parse_reply(&stdout).unwrap().unwrap();
        let err = reply_to_output(reply).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("strategy raised ZeroDivisionError: division by zero"));
        assert!(msg.contains("x = 1 / 0"));
    }

    #[test]
    fn test_non_finite_values_survive() {
        let stdout = format!(
            "{}{}",
            RESULT_MARKER,
            r#"{"ok": true, "returns": [["2020-01-02", null], ["2020-01-03", "inf"]], "turnover": "-inf", "diagnostics": {"sharpe": 1.5, "bad": null}}"#
        );
        let output = reply_to_output(parse_reply(&stdout).unwrap().unwrap()).unwrap();
        assert!(output.returns[0].1.is_nan());
        assert_eq!(output.returns[1].1, f64::INFINITY);
        assert_eq!(output.turnover, f64::NEG_INFINITY);
        assert_eq!(output.diagnostics["sharpe"], 1.5);
        assert!(output.diagnostics["bad"].is_nan());
    }

    #[test]
    fn test_bad_date_is_malformed() {
        let stdout = format!("{}{}", RESULT_MARKER, r#"{"ok": true, "returns": [["yesterday", 0.1]]}"#);
        let err = reply_to_output(parse_reply(&stdout).unwrap().unwrap()).unwrap_err();
        assert!(matches!(err, ExecutionFault::Malformed(_)));
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 3), "");
    }

    #[test]
    fn test_hash_seed_wraps_into_u32() {
        assert_eq!(hash_seed(42), 42);
        assert_eq!(hash_seed(u64::from(u32::MAX)), u32::MAX);
        assert_eq!(hash_seed(5_000_000_000), 705_032_704);
    }

    fn breakout_spec() -> TaskSpec {
        SpecGuard::new(Arc::new(TaskCatalog::builtin().unwrap()))
            .validate(&TaskRequest::shortcut("breakout"))
            .unwrap()
    }

    /// Ten consecutive days of rising closes for every symbol of the spec
    fn rising_table(spec: &TaskSpec) -> PriceTable {
        let series: Vec<BTreeMap<NaiveDate, f64>> = (0..spec.universe.len())
            .map(|i| {
                spec.start_date
                    .iter_days()
                    .take(10)
                    .enumerate()
                    .map(|(k, day)| (day, 100.0 + (i * 10) as f64 + k as f64))
                    .collect()
            })
            .collect();
        let columns: Vec<(String, &BTreeMap<NaiveDate, f64>)> =
            spec.universe.iter().cloned().zip(series.iter()).collect();
        PriceTable::align(&columns, spec.start_date, spec.end_date)
    }

    fn pandas_available() -> bool {
        std::process::Command::new("python3")
            .args(["-c", "import pandas"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Run `source` through the real harness; `None` when pandas is not installed.
    async fn run_harness(source: &str, seed: u64) -> Option<(PriceTable, Result<StrategyOutput, ExecutionFault>)> {
        if !pandas_available() {
            eprintln!("skipping: python3 with pandas not available");
            return None;
        }
        let spec = breakout_spec();
        let dataset = rising_table(&spec);
        let executor = PythonExecutor::new(&ExecutorConfig::default());
        let result = executor.execute(source, &dataset, &spec, seed).await;
        Some((dataset, result))
    }

    #[tokio::test]
    async fn test_harness_series_output() {
        let source = "import pandas as pd\n\ndef run_strategy(prices, spec):\n    return prices.pct_change().mean(axis=1)\n";
        let Some((dataset, result)) = run_harness(source, 42).await else {
            return;
        };
        let output = result.unwrap();
        assert_eq!(output.returns.len(), dataset.len());
        assert_eq!(output.returns[0].0, dataset.first_date().unwrap());
        // pct_change leaves the first bar empty; the harness fills it flat
        assert_eq!(output.returns[0].1, 0.0);
        assert!(output.returns[1..].iter().all(|(_, r)| *r > 0.0));
        assert_eq!(output.turnover, 0.0);
        assert!(output.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_harness_dict_output() {
        let source = r#"
def run_strategy(prices, spec):
    rets = prices.pct_change().mean(axis=1)
    return {"returns": rets, "turnover": 0.25, "gross_leverage": 1, "traded": True, "label": "x"}
"#;
        let Some((_, result)) = run_harness(source, 42).await else {
            return;
        };
        let output = result.unwrap();
        assert_eq!(output.turnover, 0.25);
        assert_eq!(output.diagnostics.get("gross_leverage"), Some(&1.0));
        assert!(!output.diagnostics.contains_key("traded"));
        assert!(!output.diagnostics.contains_key("label"));
        assert_eq!(output.diagnostics.get("turnover"), Some(&0.25));
    }

    #[tokio::test]
    async fn test_harness_dict_without_returns_raises() {
        let source = "def run_strategy(prices, spec):\n    return {\"turnover\": 0.1}\n";
        let Some((_, result)) = run_harness(source, 42).await else {
            return;
        };
        let err = result.unwrap_err();
        assert!(matches!(err, ExecutionFault::Raised(_)));
        assert!(err.to_string().contains("must contain 'returns'"));
    }

    #[tokio::test]
    async fn test_harness_non_series_returns_raise() {
        let source = "def run_strategy(prices, spec):\n    return [0.01, 0.02]\n";
        let Some((_, result)) = run_harness(source, 42).await else {
            return;
        };
        let err = result.unwrap_err();
        assert!(err.to_string().contains("TypeError: strategy returns must be a pandas Series"));
    }

    #[tokio::test]
    async fn test_harness_exception_reported() {
        let source = "def run_strategy(prices, spec):\n    return 1 / 0\n";
        let Some((_, result)) = run_harness(source, 42).await else {
            return;
        };
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("strategy raised ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_seed_beyond_u32_still_runs() {
        let source = r#"
import os
import random

def run_strategy(prices, spec):
    rets = prices.pct_change().mean(axis=1)
    return {"returns": rets, "hash_seed": float(os.environ["PYTHONHASHSEED"]), "draw": random.random()}
"#;
        let Some((_, first)) = run_harness(source, 5_000_000_001).await else {
            return;
        };
        let first = first.unwrap();
        assert_eq!(first.diagnostics["hash_seed"], 705_032_705.0);

        let (_, again) = run_harness(source, 5_000_000_001).await.unwrap();
        assert_eq!(again.unwrap().diagnostics["draw"], first.diagnostics["draw"]);
        let (_, other) = run_harness(source, 7).await.unwrap();
        assert_ne!(other.unwrap().diagnostics["draw"], first.diagnostics["draw"]);
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_fault() {
        let executor = PythonExecutor::new(&ExecutorConfig {
            python_bin: "/nonexistent/stratloop-python".to_string(),
            ..ExecutorConfig::default()
        });
        let spec = SpecGuard::new(Arc::new(TaskCatalog::builtin().unwrap()))
            .validate(&TaskRequest::shortcut("breakout"))
            .unwrap();
        let dataset = PriceTable::align(&[], spec.start_date, spec.end_date);
        let result = executor.execute("x = 1\n", &dataset, &spec, spec.seed).await;
        assert!(matches!(result, Err(ExecutionFault::Io(_))));
    }
}
