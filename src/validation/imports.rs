// Import and entry-point scan over candidate source

use crate::config::StaticCheckConfig;
use crate::error::Result;
use crate::tools::ToolSet;
use crate::validation::traits::{CheckResult, StaticVerifier};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([^#\n]+)").unwrap());
static FROM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*from[ \t]+(\S+)[ \t]+import\b").unwrap());

/// Rejects candidates that lack the entry point or import outside the allowed set
pub struct ImportVerifier {
    entry_point: String,
    allowed: Vec<String>,
}

impl ImportVerifier {
    pub fn new(entry_point: impl Into<String>, allowed: Vec<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            allowed,
        }
    }

    pub fn from_config(config: &StaticCheckConfig) -> Self {
        Self::new(config.entry_point.clone(), config.allowed_imports.clone())
    }

    fn defines_entry_point(&self, source: &str) -> bool {
        source.lines().any(|line| {
            line.strip_prefix("def ")
                .map(|rest| rest.trim_start())
                .and_then(|rest| rest.strip_prefix(self.entry_point.as_str()))
                .is_some_and(|rest| rest.trim_start().starts_with('('))
        })
    }
}

/// Top-level module names imported by `source`, in order of appearance.
///
/// Relative imports come back with their leading dots.
pub fn imported_roots(source: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for caps in IMPORT_RE.captures_iter(source) {
        let Some(list) = caps.get(1) else { continue };
        for item in list.as_str().split(',') {
            let module = item.split_whitespace().next().unwrap_or_default();
            if !module.is_empty() {
                found.push((list.start(), root_of(module)));
            }
        }
    }
    for caps in FROM_RE.captures_iter(source) {
        if let Some(module) = caps.get(1) {
            found.push((module.start(), root_of(module.as_str())));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    let mut roots: Vec<String> = Vec::new();
    for (_, root) in found {
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

fn root_of(module: &str) -> String {
    if module.starts_with('.') {
        return module.to_string();
    }
    module.split('.').next().unwrap_or(module).to_string()
}

#[async_trait]
impl StaticVerifier for ImportVerifier {
    async fn verify(&self, source: &str, tools: &ToolSet) -> Result<CheckResult> {
        let mut result = CheckResult::pass();

        if !self.defines_entry_point(source) {
            result.add_problem(format!(
                "entry point `def {}(prices, spec)` is not defined at module level",
                self.entry_point
            ));
        }

        let tool_roots = tools.import_roots();
        for root in imported_roots(source) {
            let allowed = self.allowed.iter().any(|a| a == &root) || tool_roots.contains(&root.as_str());
            if !allowed {
                result.add_problem(format!("import of '{}' is not allowed", root));
            }
        }

        Ok(result)
    }

    fn description(&self) -> &str {
        "imports"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolRegistry, ToolResolver};
    use std::path::Path;
    use std::sync::Arc;

    fn verifier() -> ImportVerifier {
        ImportVerifier::from_config(&StaticCheckConfig::default())
    }

    fn tools(names: &[&str]) -> ToolSet {
        let registry = ToolRegistry::builtin(Path::new("toolkit")).unwrap();
        ToolResolver::new(Arc::new(registry)).resolve(names).unwrap()
    }

    #[test]
    fn test_imported_roots() {
        let source = "import numpy as np\nimport os.path, sys\nfrom pandas import DataFrame\nfrom stratkit.returns import simple_returns\nfrom . import sibling\n    import math  # nested\n";
        assert_eq!(
            imported_roots(source),
            vec!["numpy", "os", "sys", "pandas", "stratkit", ".", "math"]
        );
    }

    #[test]
    fn test_imported_roots_ignores_comments_and_strings_in_body() {
        let source = "# import os\nx = 'from os import path'\n";
        assert!(imported_roots(source).is_empty());
    }

    #[tokio::test]
    async fn test_accepts_allowed_imports() {
        let source = "import pandas as pd\nimport numpy as np\n\ndef run_strategy(prices, spec):\n    return prices.pct_change().mean(axis=1)\n";
        let result = verifier().verify(source, &ToolSet::empty()).await.unwrap();
        assert!(result.passed, "{}", result.detail);
    }

    #[tokio::test]
    async fn test_missing_entry_point() {
        let source = "import pandas as pd\n\ndef strategy(prices, spec):\n    pass\n";
        let result = verifier().verify(source, &ToolSet::empty()).await.unwrap();
        assert!(!result.passed);
        assert!(result.problems[0].contains("run_strategy"));
    }

    #[tokio::test]
    async fn test_nested_entry_point_does_not_count() {
        let source = "class S:\n    def run_strategy(self, prices, spec):\n        pass\n";
        let result = verifier().verify(source, &ToolSet::empty()).await.unwrap();
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_rejects_disallowed_import() {
        let source = "import subprocess\n\ndef run_strategy(prices, spec):\n    pass\n";
        let result = verifier().verify(source, &ToolSet::empty()).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.problems, vec!["import of 'subprocess' is not allowed".to_string()]);
    }

    #[tokio::test]
    async fn test_tool_modules_allowed_only_when_resolved() {
        let source = "from stratkit.returns import simple_returns\n\ndef run_strategy(prices, spec):\n    pass\n";
        let with_tools = verifier().verify(source, &tools(&["returns"])).await.unwrap();
        assert!(with_tools.passed, "{}", with_tools.detail);

        let without = verifier().verify(source, &ToolSet::empty()).await.unwrap();
        assert!(!without.passed);
    }
}
