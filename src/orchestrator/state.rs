//! Run state machine.
//!
//! Every legal move of a run is one row of `transition`. The orchestrator
//! never changes state any other way.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Guarding,
    Resolving,
    Generating,
    StaticChecking,
    Executing,
    ResultChecking,
    Repairing,
    Accepted,
    Exhausted,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Accepted | RunState::Exhausted | RunState::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Guarding => "guarding",
            RunState::Resolving => "resolving",
            RunState::Generating => "generating",
            RunState::StaticChecking => "static_checking",
            RunState::Executing => "executing",
            RunState::ResultChecking => "result_checking",
            RunState::Repairing => "repairing",
            RunState::Accepted => "accepted",
            RunState::Exhausted => "exhausted",
            RunState::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageEvent {
    /// The stage succeeded
    Passed,
    /// The candidate failed a check; the run may repair
    Failed,
    /// A collaborator failed; the run cannot continue
    Aborted,
    /// Repairing: budget left, generate again
    Retry,
    /// Repairing: budget used up
    BudgetSpent,
}

/// The full transition table. `None` means the move is illegal.
pub fn transition(state: RunState, event: StageEvent) -> Option<RunState> {
    use RunState::*;
    use StageEvent as E;

    match (state, event) {
        (Guarding, E::Passed) => Some(Resolving),
        (Guarding, E::Aborted) => Some(Aborted),

        (Resolving, E::Passed) => Some(Generating),
        (Resolving, E::Aborted) => Some(Aborted),

        (Generating, E::Passed) => Some(StaticChecking),
        (Generating, E::Aborted) => Some(Aborted),

        (StaticChecking, E::Passed) => Some(Executing),
        (StaticChecking, E::Failed) => Some(Repairing),

        (Executing, E::Passed) => Some(ResultChecking),
        (Executing, E::Failed) => Some(Repairing),

        (ResultChecking, E::Passed) => Some(Accepted),
        (ResultChecking, E::Failed) => Some(Repairing),

        (Repairing, E::Retry) => Some(Generating),
        (Repairing, E::BudgetSpent) => Some(Exhausted),

        _ => None,
    }
}
