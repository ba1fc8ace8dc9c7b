//! One pass through generate, check, execute and verify.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repair::FailureSignal;
use crate::runner::Metrics;

/// How far a candidate got through one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Passed,
    Failed { message: String },
    NotReached,
}

impl StageOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        StageOutcome::Failed {
            message: message.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, StageOutcome::Passed)
    }
}

/// Record of a single attempt. Appended to the history once complete and
/// never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based
    pub number: u32,
    pub seed: u64,
    pub repair_hint: Option<String>,
    pub code: String,
    pub code_sha256: String,
    pub static_check: StageOutcome,
    pub execution: StageOutcome,
    pub result_check: StageOutcome,
    pub metrics: Option<Metrics>,
    pub failure: Option<FailureSignal>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Attempt {
    pub fn accepted(&self) -> bool {
        self.failure.is_none() && self.result_check.is_passed()
    }
}

/// Fields of an attempt that are filled in while it runs.
#[derive(Debug)]
pub(crate) struct AttemptDraft {
    pub number: u32,
    pub seed: u64,
    pub repair_hint: Option<String>,
    pub code: String,
    pub code_sha256: String,
    pub static_check: StageOutcome,
    pub execution: StageOutcome,
    pub result_check: StageOutcome,
    pub metrics: Option<Metrics>,
    pub started_at: DateTime<Utc>,
}

impl AttemptDraft {
    pub fn new(number: u32, seed: u64, repair_hint: Option<String>) -> Self {
        Self {
            number,
            seed,
            repair_hint,
            code: String::new(),
            code_sha256: String::new(),
            static_check: StageOutcome::NotReached,
            execution: StageOutcome::NotReached,
            result_check: StageOutcome::NotReached,
            metrics: None,
            started_at: Utc::now(),
        }
    }

    pub fn finish(self, failure: Option<FailureSignal>) -> Attempt {
        Attempt {
            number: self.number,
            seed: self.seed,
            repair_hint: self.repair_hint,
            code: self.code,
            code_sha256: self.code_sha256,
            static_check: self.static_check,
            execution: self.execution,
            result_check: self.result_check,
            metrics: self.metrics,
            failure,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
