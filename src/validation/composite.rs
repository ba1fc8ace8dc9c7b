// Chains static verifiers, stopping at the first failure

use crate::error::Result;
use crate::tools::ToolSet;
use crate::validation::traits::{CheckResult, StaticVerifier};
use async_trait::async_trait;

/// Runs verifiers in sequence. The first failing verifier decides the result
/// and later ones are skipped.
pub struct CompositeVerifier {
    verifiers: Vec<Box<dyn StaticVerifier>>,
    description: String,
}

impl CompositeVerifier {
    /// Create a new empty composite verifier
    pub fn new() -> Self {
        Self {
            verifiers: Vec::new(),
            description: "composite verifier".to_string(),
        }
    }

    /// Add a verifier to the chain (builder pattern)
    pub fn with_verifier(mut self, verifier: impl StaticVerifier + 'static) -> Self {
        self.verifiers.push(Box::new(verifier));
        self
    }

    /// Get the number of verifiers in the chain
    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    /// Check if the composite has no verifiers
    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    /// Get descriptions of all verifiers in the chain
    pub fn verifier_descriptions(&self) -> Vec<&str> {
        self.verifiers.iter().map(|v| v.description()).collect()
    }
}

impl Default for CompositeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StaticVerifier for CompositeVerifier {
    async fn verify(&self, source: &str, tools: &ToolSet) -> Result<CheckResult> {
        let mut combined = CheckResult::pass();

        for verifier in &self.verifiers {
            let result = verifier.verify(source, tools).await?;
            let failed = !result.passed;
            combined.absorb(result);
            if failed {
                break;
            }
        }

        Ok(combined)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockVerifier {
        should_pass: bool,
        desc: String,
        calls: Arc<AtomicU32>,
    }

    impl MockVerifier {
        fn new(desc: &str, should_pass: bool, calls: Arc<AtomicU32>) -> Self {
            Self {
                should_pass,
                desc: desc.to_string(),
                calls,
            }
        }
    }

    #[async_trait]
    impl StaticVerifier for MockVerifier {
        async fn verify(&self, _source: &str, _tools: &ToolSet) -> Result<CheckResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.should_pass {
                Ok(CheckResult::pass_with_detail(format!("{} passed", self.desc)))
            } else {
                Ok(CheckResult::fail(format!("{} failed", self.desc)))
            }
        }

        fn description(&self) -> &str {
            &self.desc
        }
    }

    #[tokio::test]
    async fn test_empty_composite_passes() {
        let composite = CompositeVerifier::new();
        assert!(composite.is_empty());
        let result = composite.verify("", &ToolSet::empty()).await.unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_all_pass() {
        let calls = Arc::new(AtomicU32::new(0));
        let composite = CompositeVerifier::new()
            .with_verifier(MockVerifier::new("imports", true, calls.clone()))
            .with_verifier(MockVerifier::new("compile", true, calls.clone()));

        let result = composite.verify("", &ToolSet::empty()).await.unwrap();
        assert!(result.passed);
        assert_eq!(result.detail, "imports passed\ncompile passed");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let composite = CompositeVerifier::new()
            .with_verifier(MockVerifier::new("imports", false, calls.clone()))
            .with_verifier(MockVerifier::new("compile", false, calls.clone()));

        let result = composite.verify("", &ToolSet::empty()).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.problems, vec!["imports failed".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_descriptions() {
        let calls = Arc::new(AtomicU32::new(0));
        let composite = CompositeVerifier::new()
            .with_verifier(MockVerifier::new("imports", true, calls.clone()))
            .with_verifier(MockVerifier::new("compile", true, calls));
        assert_eq!(composite.len(), 2);
        assert_eq!(composite.verifier_descriptions(), vec!["imports", "compile"]);
    }
}
