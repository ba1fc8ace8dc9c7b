//! Repair hint synthesis.

use super::FailureSignal;

/// Pitfalls repeated in every hint, regardless of the failure.
pub const CHECKLIST: [&str; 6] = [
    "Align every series on the prices index before combining them; reindex instead of relying on position.",
    "Diagnostics must be plain scalars (float/int), never Series or arrays.",
    "Do not use a boolean DataFrame as a column selector; select columns by label and mask values with .where().",
    "Hold positions across the whole holding period; smooth or forward-fill weights between rebalance dates.",
    "Normalize weights so gross exposure stays within max_leverage before computing turnover.",
    "Turnover is the mean absolute change in weights per bar and must stay bounded.",
];

const PARAM_KEYS: [&str; 3] = ["lookback", "top_k", "holding_period"];

/// What to tell the generator next, and whether it gets another try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    pub hint: String,
    pub next_attempt: u32,
    pub attempts_remain: bool,
}

/// Builds repair hints from the latest failure signal.
///
/// Output depends only on the arguments, so identical failures produce
/// identical hints.
#[derive(Debug, Clone)]
pub struct Fixer {
    max_hint_chars: usize,
}

impl Fixer {
    pub fn new(max_hint_chars: usize) -> Self {
        Self { max_hint_chars }
    }

    pub fn plan(
        &self,
        signal: &FailureSignal,
        attempt: u32,
        max_attempts: u32,
        task_id: &str,
        prior_hint: Option<&str>,
    ) -> RepairPlan {
        let next_attempt = attempt + 1;
        let mut hint = format!("Repair attempt {} for task {}.\n", next_attempt, task_id);

        match signal {
            FailureSignal::Static(msg) => {
                hint.push_str(&format!("Attempt {} failed static checks:\n{}\n", attempt, msg.trim()));
            }
            FailureSignal::Runtime(msg) => {
                hint.push_str(&format!("Attempt {} failed at runtime:\n{}\n", attempt, msg.trim()));
            }
            FailureSignal::Semantic(checks) => {
                hint.push_str(&format!(
                    "Attempt {} ran but failed verifier checks: {}\n",
                    attempt,
                    checks.join(", ")
                ));
            }
        }

        let message = signal.message();
        if PARAM_KEYS.iter().any(|k| message.contains(k)) {
            hint.push_str(
                "Read parameters from spec[\"params\"] (for example spec[\"params\"][\"lookback\"]) and cast them to int before use.\n",
            );
        }

        hint.push_str("\nChecklist:\n");
        for item in CHECKLIST {
            hint.push_str("- ");
            hint.push_str(item);
            hint.push('\n');
        }

        if let Some(prior) = prior_hint.map(str::trim).filter(|p| !p.is_empty()) {
            hint.push_str("\nEarlier repair context:\n");
            hint.push_str(&truncate_chars(prior, self.max_hint_chars));
            hint.push('\n');
        }

        RepairPlan {
            hint,
            next_attempt,
            attempts_remain: attempt < max_attempts,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
