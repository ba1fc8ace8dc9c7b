//! Strategy execution interface.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::data::PriceTable;
use crate::task::TaskSpec;

/// What a strategy hands back after running over the dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    /// Per-bar portfolio returns, gross of costs
    pub returns: Vec<(NaiveDate, f64)>,
    pub turnover: f64,
    /// Extra scalar figures the strategy chose to report
    pub diagnostics: BTreeMap<String, f64>,
}

/// Faults raised while running untrusted strategy code
#[derive(Debug, Error)]
pub enum ExecutionFault {
    #[error("strategy raised {0}")]
    Raised(String),

    #[error("execution timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed strategy output: {0}")]
    Malformed(String),

    #[error("executor process failed: {0}")]
    Process(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs a candidate module's entry point against a dataset.
///
/// `seed` is the attempt seed; any randomness in the run derives from it.
/// Implementations must not leave anything behind on disk, whatever the
/// outcome.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    async fn execute(
        &self,
        source: &str,
        dataset: &PriceTable,
        spec: &TaskSpec,
        seed: u64,
    ) -> Result<StrategyOutput, ExecutionFault>;
}
