//! Failure signals and repair hint synthesis.
//!
//! A `FailureSignal` is what a failed attempt leaves behind. The `Fixer`
//! turns the latest one into a hint for the next generation call; it never
//! sees the attempt history, only the hint it wrote last time.

mod fixer;

pub use fixer::{CHECKLIST, Fixer, RepairPlan};

use serde::{Deserialize, Serialize};

/// Why an attempt's candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureSignal {
    /// The source failed a static check
    Static(String),
    /// The candidate failed while running
    Runtime(String),
    /// The candidate ran but its metrics broke named sanity checks
    Semantic(Vec<String>),
}

impl FailureSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureSignal::Static(_) => "static",
            FailureSignal::Runtime(_) => "runtime",
            FailureSignal::Semantic(_) => "verifier",
        }
    }

    /// Raw message, or the failed check names joined with commas
    pub fn message(&self) -> String {
        match self {
            FailureSignal::Static(msg) | FailureSignal::Runtime(msg) => msg.clone(),
            FailureSignal::Semantic(checks) => checks.join(", "),
        }
    }
}

impl std::fmt::Display for FailureSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}
