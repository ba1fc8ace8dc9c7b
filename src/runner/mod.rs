//! Candidate execution and performance metrics.
//!
//! `StrategyExecutor` is the seam between the loop and untrusted code.
//! `PythonExecutor` runs candidates in a scratch directory through a small
//! embedded harness; `Runner` feeds it the task's dataset and turns the
//! returned series into `Metrics`.

mod executor;
mod metrics;
mod python;
mod strategy_runner;

pub use executor::{ExecutionFault, StrategyExecutor, StrategyOutput};
pub use metrics::Metrics;
pub use python::PythonExecutor;
pub use strategy_runner::{Runner, RuntimeFault};
