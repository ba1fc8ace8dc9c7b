//! Markdown summary of a run.

use std::fmt::Write;

use crate::orchestrator::{Report, StageOutcome};

fn outcome(stage: &StageOutcome) -> &'static str {
    match stage {
        StageOutcome::Passed => "pass",
        StageOutcome::Failed { .. } => "FAIL",
        StageOutcome::NotReached => "-",
    }
}

pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    let task = report.task_id.as_deref().unwrap_or("(invalid request)");

    let _ = writeln!(out, "# Run {}\n", report.run_id);
    let _ = writeln!(out, "- task: {}", task);
    let _ = writeln!(out, "- mode: {}", report.mode);
    let _ = writeln!(out, "- status: **{}**", report.status);
    let _ = writeln!(out, "- attempts: {}/{}", report.attempts.len(), report.max_attempts);
    if !report.tools.is_empty() {
        let _ = writeln!(out, "- tools: {}", report.tools.join(", "));
    }
    let _ = writeln!(out, "- duration: {}ms", report.duration_ms());
    if let Some(failure) = &report.blocking_failure {
        let _ = writeln!(out, "- blocking failure: {}", failure.to_string().lines().next().unwrap_or_default());
    }

    if let Some(metrics) = &report.final_metrics {
        let _ = writeln!(out, "\n## Metrics\n");
        let _ = writeln!(out, "| metric | value |");
        let _ = writeln!(out, "|---|---|");
        for (name, value) in metrics.fields() {
            let _ = writeln!(out, "| {} | {:.4} |", name, value);
        }
    }

    if !report.attempts.is_empty() {
        let _ = writeln!(out, "\n## Attempts\n");
        let _ = writeln!(out, "| # | seed | static | execution | verifier | sha256 |");
        let _ = writeln!(out, "|---|---|---|---|---|---|");
        for attempt in &report.attempts {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                attempt.number,
                attempt.seed,
                outcome(&attempt.static_check),
                outcome(&attempt.execution),
                outcome(&attempt.result_check),
                attempt.code_sha256.get(..12).unwrap_or(&attempt.code_sha256),
            );
        }
        for attempt in report.attempts.iter().filter(|a| a.failure.is_some()) {
            if let Some(failure) = &attempt.failure {
                let _ = writeln!(out, "\n### Attempt {} ({})\n", attempt.number, failure.kind());
                let _ = writeln!(out, "```\n{}\n```", failure.message().trim());
            }
        }
    }

    out
}
