//! Run orchestration: the state table, attempt records, reports and the
//! loop that ties generation, checks, execution and repair together.

mod attempt;
mod engine;
mod report;
mod state;

pub use attempt::{Attempt, StageOutcome};
pub use engine::Orchestrator;
pub use report::{AbortKind, BlockingFailure, Report, RunMode, RunStatus};
pub use state::{RunState, StageEvent, transition};
