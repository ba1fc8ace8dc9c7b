//! Final record of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repair::FailureSignal;
use crate::runner::Metrics;

use super::attempt::Attempt;

/// How the run was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Repair loop with the configured attempt budget
    Agentic,
    /// One attempt, tools offered
    SingleShot,
    /// One attempt, no tools offered
    PureLlm,
}

impl RunMode {
    pub const ALL: [RunMode; 3] = [RunMode::Agentic, RunMode::SingleShot, RunMode::PureLlm];

    /// Attempt budget for this mode given the configured maximum
    pub fn budget(&self, configured: u32) -> u32 {
        match self {
            RunMode::Agentic => configured.max(1),
            RunMode::SingleShot | RunMode::PureLlm => 1,
        }
    }

    pub fn offers_tools(&self) -> bool {
        !matches!(self, RunMode::PureLlm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Agentic => "agentic",
            RunMode::SingleShot => "single_shot",
            RunMode::PureLlm => "pure_llm",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Accepted,
    Exhausted,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Accepted => "accepted",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run stopped before producing code worth repairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortKind {
    InvalidSpec,
    UnknownTool,
    DataUnavailable,
    Generation,
    /// The state machine was asked for an illegal move
    Internal,
}

/// What ended a run that was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockingFailure {
    /// The last attempt's failure, verbatim
    Signal { signal: FailureSignal },
    Abort { kind: AbortKind, message: String },
}

impl std::fmt::Display for BlockingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockingFailure::Signal { signal } => write!(f, "{}", signal),
            BlockingFailure::Abort { kind, message } => write!(f, "{:?}: {}", kind, message),
        }
    }
}

/// Outcome of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub mode: RunMode,
    /// Absent when the request never became a valid spec
    pub task_id: Option<String>,
    pub tools: Vec<String>,
    pub status: RunStatus,
    pub final_metrics: Option<Metrics>,
    pub attempts: Vec<Attempt>,
    pub blocking_failure: Option<BlockingFailure>,
    pub max_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    pub fn is_accepted(&self) -> bool {
        self.status == RunStatus::Accepted
    }

    pub fn attempts_used(&self) -> usize {
        self.attempts.len()
    }

    /// True when the run stopped on a collaborator error, not on code quality
    pub fn is_error(&self) -> bool {
        matches!(self.blocking_failure, Some(BlockingFailure::Abort { .. }))
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
