//! Runs candidates over the task's dataset and turns their output into metrics.

use std::sync::Arc;

use log::{debug, warn};

use crate::data::{DataError, DataLoader, PriceTable};
use crate::generator::Candidate;
use crate::task::TaskSpec;

use super::executor::StrategyExecutor;
use super::metrics::Metrics;

/// A candidate failed while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFault {
    pub message: String,
}

impl RuntimeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Executes candidates and computes metrics.
pub struct Runner<E: StrategyExecutor> {
    executor: Arc<E>,
    loader: Arc<DataLoader>,
}

impl<E: StrategyExecutor> Runner<E> {
    pub fn new(executor: Arc<E>, loader: Arc<DataLoader>) -> Self {
        Self { executor, loader }
    }

    /// Load the dataset once per run, before any code is generated.
    pub async fn prepare(&self, spec: &TaskSpec) -> Result<PriceTable, DataError> {
        let table = self
            .loader
            .load_series(&spec.universe, spec.start_date, spec.end_date)
            .await?;
        debug!(
            "Prepared {} rows x {} symbols for {}",
            table.len(),
            table.symbols().len(),
            spec.task_id
        );
        Ok(table)
    }

    /// Run a candidate and compute metrics over its returns in the window.
    ///
    /// Missing returns count as flat bars. Bars outside the task window are
    /// dropped before any metric is taken.
    pub async fn run(
        &self,
        candidate: &Candidate,
        dataset: &PriceTable,
        spec: &TaskSpec,
        seed: u64,
    ) -> Result<Metrics, RuntimeFault> {
        let output = self
            .executor
            .execute(&candidate.source, dataset, spec, seed)
            .await
            .map_err(|e| RuntimeFault::new(e.to_string()))?;

        let mut bars: Vec<_> = output
            .returns
            .into_iter()
            .filter(|(date, _)| *date >= spec.start_date && *date <= spec.end_date)
            .map(|(date, r)| (date, if r.is_nan() { 0.0 } else { r }))
            .collect();
        bars.sort_by_key(|(date, _)| *date);

        if bars.is_empty() {
            warn!("Candidate {} produced no returns inside the window", &candidate.sha256[..8]);
            return Err(RuntimeFault::new(format!(
                "strategy produced no returns between {} and {}",
                spec.start_date, spec.end_date
            )));
        }

        let returns: Vec<f64> = bars.into_iter().map(|(_, r)| r).collect();
        Ok(Metrics::compute(
            &returns,
            output.turnover,
            spec.costs_bps,
            spec.frequency.periods_per_year(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PriceSupplier, SeriesCache};
    use crate::runner::{ExecutionFault, StrategyOutput};
    use crate::task::{SpecGuard, TaskCatalog, TaskRequest};
    use async_trait::async_trait;
    use chrono::{Datelike, NaiveDate};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FlatSupplier;

    #[async_trait]
    impl PriceSupplier for FlatSupplier {
        async fn fetch(&self, _symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<BTreeMap<NaiveDate, f64>, DataError> {
            Ok(start
                .iter_days()
                .take_while(|day| *day <= end)
                .filter(|day| day.weekday().number_from_monday() <= 5)
                .map(|day| (day, 100.0))
                .collect())
        }

        fn name(&self) -> &str {
            "flat"
        }
    }

    /// Replays a fixed output, or raises when none is configured.
    struct FixedExecutor {
        output: Option<StrategyOutput>,
    }

    #[async_trait]
    impl StrategyExecutor for FixedExecutor {
        async fn execute(
            &self,
            _source: &str,
            _dataset: &PriceTable,
            _spec: &TaskSpec,
            _seed: u64,
        ) -> Result<StrategyOutput, ExecutionFault> {
            self.output
                .clone()
                .ok_or_else(|| ExecutionFault::Raised("ZeroDivisionError: division by zero".to_string()))
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn spec() -> TaskSpec {
        let mut spec = SpecGuard::new(Arc::new(TaskCatalog::builtin().unwrap()))
            .validate(&TaskRequest::shortcut("momentum_daily"))
            .unwrap();
        spec.start_date = d(2020, 1, 1);
        spec.end_date = d(2020, 1, 31);
        spec.costs_bps = 0.0;
        spec
    }

    fn runner(temp: &TempDir, output: Option<StrategyOutput>) -> Runner<FixedExecutor> {
        let loader = DataLoader::new(SeriesCache::new(temp.path(), "test"), Arc::new(FlatSupplier), Duration::from_secs(5));
        Runner::new(Arc::new(FixedExecutor { output }), Arc::new(loader))
    }

    #[tokio::test]
    async fn test_prepare_loads_universe() {
        let temp = TempDir::new().unwrap();
        let spec = spec();
        let table = runner(&temp, None).prepare(&spec).await.unwrap();
        assert_eq!(table.symbols(), spec.universe.as_slice());
        assert_eq!(table.first_date(), Some(d(2020, 1, 1)));
    }

    #[tokio::test]
    async fn test_run_clips_to_window_and_fills_gaps() {
        let temp = TempDir::new().unwrap();
        let spec = spec();
        let output = StrategyOutput {
            returns: vec![
                (d(2020, 1, 3), 0.01),
                (d(2019, 12, 31), 5.0),
                (d(2020, 1, 2), f64::NAN),
                (d(2020, 2, 3), -0.9),
            ],
            turnover: 0.1,
            diagnostics: BTreeMap::new(),
        };
        let r = runner(&temp, Some(output));
        let dataset = r.prepare(&spec).await.unwrap();
        let metrics = r.run(&Candidate::new("x = 1\n"), &dataset, &spec, spec.seed).await.unwrap();
        assert!((metrics.total_return - 0.01).abs() < 1e-12);
        assert!((metrics.hit_rate - 0.5).abs() < 1e-12);
        assert_eq!(metrics.max_drawdown, 0.0);
    }

    #[tokio::test]
    async fn test_run_reports_raised_error() {
        let temp = TempDir::new().unwrap();
        let spec = spec();
        let r = runner(&temp, None);
        let dataset = r.prepare(&spec).await.unwrap();
        let fault = r.run(&Candidate::new("x = 1\n"), &dataset, &spec, spec.seed).await.unwrap_err();
        assert!(fault.message.contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_run_without_returns_is_a_fault() {
        let temp = TempDir::new().unwrap();
        let spec = spec();
        let r = runner(&temp, Some(StrategyOutput::default()));
        let dataset = r.prepare(&spec).await.unwrap();
        let fault = r.run(&Candidate::new("x = 1\n"), &dataset, &spec, spec.seed).await.unwrap_err();
        assert!(fault.to_string().contains("no returns"));
    }
}
