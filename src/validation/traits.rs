// Static verification interfaces

use crate::error::Result;
use crate::tools::ToolSet;
use async_trait::async_trait;

/// Outcome of checking a candidate without running it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub passed: bool,
    /// Text handed to the repair hint when the check fails
    pub detail: String,
    /// One entry per problem found
    pub problems: Vec<String>,
}

impl CheckResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            detail: String::new(),
            problems: Vec::new(),
        }
    }

    /// Passing result carrying tool output (compiler chatter, warnings)
    pub fn pass_with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            ..Self::pass()
        }
    }

    pub fn fail(problem: impl Into<String>) -> Self {
        let mut result = Self::pass();
        result.add_problem(problem);
        result
    }

    /// Record a problem; the result no longer passes
    pub fn add_problem(&mut self, problem: impl Into<String>) {
        let problem = problem.into();
        append_line(&mut self.detail, &problem);
        self.problems.push(problem);
        self.passed = false;
    }

    /// Fold `other` into this result
    pub fn absorb(&mut self, other: CheckResult) {
        self.passed &= other.passed;
        append_line(&mut self.detail, &other.detail);
        self.problems.extend(other.problems);
    }
}

impl Default for CheckResult {
    fn default() -> Self {
        Self::pass()
    }
}

fn append_line(buf: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

/// Checks a candidate's source before it is ever executed
#[async_trait]
pub trait StaticVerifier: Send + Sync {
    /// Inspect `source` against the tools the candidate was offered
    async fn verify(&self, source: &str, tools: &ToolSet) -> Result<CheckResult>;

    fn description(&self) -> &str {
        "verifier"
    }
}
