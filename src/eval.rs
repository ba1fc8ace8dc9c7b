//! Aggregate figures over sets of run reports.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::orchestrator::{Report, RunMode};

/// Summary of a group of runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunsetSummary {
    pub runs: usize,
    /// Share of runs that ended accepted
    pub success_rate: f64,
    /// Share of runs that aborted on a collaborator or request error
    pub error_rate: f64,
    /// Population variance of the final Sharpe ratio over accepted runs
    pub sharpe_variance: f64,
    pub avg_attempts: f64,
    pub avg_tools: f64,
}

impl RunsetSummary {
    fn empty() -> Self {
        Self {
            runs: 0,
            success_rate: 0.0,
            error_rate: 0.0,
            sharpe_variance: 0.0,
            avg_attempts: 0.0,
            avg_tools: 0.0,
        }
    }
}

pub fn summarize<'a>(reports: impl IntoIterator<Item = &'a Report>) -> RunsetSummary {
    let reports: Vec<&Report> = reports.into_iter().collect();
    if reports.is_empty() {
        return RunsetSummary::empty();
    }
    let n = reports.len() as f64;

    let accepted = reports.iter().filter(|r| r.is_accepted()).count() as f64;
    let errors = reports.iter().filter(|r| r.is_error()).count() as f64;
    let attempts: usize = reports.iter().map(|r| r.attempts_used()).sum();
    let tools: usize = reports.iter().map(|r| r.tools.len()).sum();

    let sharpes: Vec<f64> = reports
        .iter()
        .filter(|r| r.is_accepted())
        .filter_map(|r| r.final_metrics.map(|m| m.sharpe))
        .filter(|s| s.is_finite())
        .collect();

    RunsetSummary {
        runs: reports.len(),
        success_rate: accepted / n,
        error_rate: errors / n,
        sharpe_variance: variance(&sharpes),
        avg_attempts: attempts as f64 / n,
        avg_tools: tools as f64 / n,
    }
}

/// One summary per mode present in `reports`.
pub fn summarize_by_mode(reports: &[Report]) -> BTreeMap<&'static str, RunsetSummary> {
    let mut groups: BTreeMap<&'static str, Vec<&Report>> = BTreeMap::new();
    for mode in RunMode::ALL {
        let group: Vec<&Report> = reports.iter().filter(|r| r.mode == mode).collect();
        if !group.is_empty() {
            groups.insert(mode.as_str(), group);
        }
    }
    groups
        .into_iter()
        .map(|(mode, group)| (mode, summarize(group)))
        .collect()
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{AbortKind, BlockingFailure, RunStatus};
    use crate::runner::Metrics;
    use chrono::Utc;

    fn report(mode: RunMode, status: RunStatus, sharpe: Option<f64>, tools: usize) -> Report {
        let now = Utc::now();
        Report {
            run_id: "r".into(),
            mode,
            task_id: Some("breakout".into()),
            tools: (0..tools).map(|i| format!("t{}", i)).collect(),
            status,
            final_metrics: sharpe.map(|sharpe| Metrics {
                total_return: 0.1,
                sharpe,
                max_drawdown: -0.1,
                turnover: 0.2,
                hit_rate: 0.5,
                profit_factor: 1.2,
            }),
            attempts: Vec::new(),
            blocking_failure: match status {
                RunStatus::Aborted => Some(BlockingFailure::Abort {
                    kind: AbortKind::DataUnavailable,
                    message: "offline".into(),
                }),
                _ => None,
            },
            max_attempts: 5,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.runs, 0);
        assert_eq!(summary.success_rate, 0.0);
    }

    #[test]
    fn test_rates_and_variance() {
        let reports = vec![
            report(RunMode::Agentic, RunStatus::Accepted, Some(1.0), 2),
            report(RunMode::Agentic, RunStatus::Accepted, Some(2.0), 2),
            report(RunMode::Agentic, RunStatus::Exhausted, Some(9.0), 1),
            report(RunMode::Agentic, RunStatus::Aborted, None, 0),
        ];
        let summary = summarize(&reports);
        assert_eq!(summary.runs, 4);
        assert_eq!(summary.success_rate, 0.5);
        assert_eq!(summary.error_rate, 0.25);
        assert!((summary.sharpe_variance - 0.25).abs() < 1e-12);
        assert_eq!(summary.avg_tools, 1.25);
    }

    #[test]
    fn test_group_by_mode() {
        let reports = vec![
            report(RunMode::Agentic, RunStatus::Accepted, Some(1.0), 2),
            report(RunMode::PureLlm, RunStatus::Exhausted, None, 0),
            report(RunMode::PureLlm, RunStatus::Accepted, Some(0.5), 0),
        ];
        let groups = summarize_by_mode(&reports);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["agentic", "pure_llm"]);
        assert_eq!(groups["pure_llm"].runs, 2);
        assert_eq!(groups["pure_llm"].success_rate, 0.5);
    }
}
