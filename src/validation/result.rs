// Sanity checks over execution metrics

use crate::config::VerifierConfig;
use crate::runner::Metrics;
use serde::{Deserialize, Serialize};

/// One named sanity rule. Names are stable and appear in reports and hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanityCheck {
    FiniteMetrics,
    NonTrivialPerformance,
    ReturnReasonable,
    TurnoverReasonable,
    SharpeInRange,
    HitRateBounds,
}

impl SanityCheck {
    pub const ALL: [SanityCheck; 6] = [
        SanityCheck::FiniteMetrics,
        SanityCheck::NonTrivialPerformance,
        SanityCheck::ReturnReasonable,
        SanityCheck::TurnoverReasonable,
        SanityCheck::SharpeInRange,
        SanityCheck::HitRateBounds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SanityCheck::FiniteMetrics => "finite_metrics",
            SanityCheck::NonTrivialPerformance => "non_trivial_performance",
            SanityCheck::ReturnReasonable => "return_reasonable",
            SanityCheck::TurnoverReasonable => "turnover_reasonable",
            SanityCheck::SharpeInRange => "sharpe_in_range",
            SanityCheck::HitRateBounds => "hit_rate_bounds",
        }
    }
}

impl std::fmt::Display for SanityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating every sanity check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub failed: Vec<SanityCheck>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|c| c.as_str().to_string()).collect()
    }
}

/// Evaluates metrics against configured thresholds
#[derive(Debug, Clone)]
pub struct ResultVerifier {
    config: VerifierConfig,
}

impl ResultVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Evaluate every check. A failing check never hides a later one.
    pub fn evaluate(&self, metrics: &Metrics) -> Verdict {
        let failed = SanityCheck::ALL
            .into_iter()
            .filter(|check| !self.holds(*check, metrics))
            .collect();
        Verdict { failed }
    }

    fn holds(&self, check: SanityCheck, m: &Metrics) -> bool {
        let c = &self.config;
        match check {
            SanityCheck::FiniteMetrics => m.fields().iter().all(|(_, v)| v.is_finite()),
            SanityCheck::NonTrivialPerformance => {
                m.total_return.abs() + m.max_drawdown.abs() + m.turnover > c.non_trivial_tolerance
            }
            SanityCheck::ReturnReasonable => {
                m.total_return >= c.min_total_return && m.total_return <= c.max_total_return
            }
            SanityCheck::TurnoverReasonable => m.turnover <= c.max_turnover,
            SanityCheck::SharpeInRange => m.sharpe >= c.sharpe_min && m.sharpe <= c.sharpe_max,
            SanityCheck::HitRateBounds => (0.0..=1.0).contains(&m.hit_rate),
        }
    }
}
