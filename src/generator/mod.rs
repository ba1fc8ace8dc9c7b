//! Candidate generation - one model call per attempt
//!
//! The prompt is rebuilt from scratch on every attempt. Nothing is cached:
//! a repeated call with the same inputs reaches the backend again.

mod extract;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::LlmConfig;
use crate::error::{Result, StratloopError};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompt::{PromptRenderer, SYSTEM_PROMPT, USER_TEMPLATE};
use crate::task::TaskSpec;
use crate::tools::{ToolRef, ToolSet};

pub use extract::extract_code;

/// Placeholder shown in place of a hint on the first attempt
pub const INITIAL_HINT: &str = "Initial synthesis. Produce a fully runnable module.";

/// Generated module source with its content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub source: String,
    pub sha256: String,
}

impl Candidate {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let sha256 = hex::encode(Sha256::digest(source.as_bytes()));
        Self { source, sha256 }
    }
}

/// Request shaping for the generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for GeneratorConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[derive(Serialize)]
struct UserPromptContext<'a> {
    attempt: u32,
    seed: u64,
    spec_json: String,
    tools: Vec<&'a ToolRef>,
}

/// Produces candidate modules from a spec, a tool set and an optional hint.
pub struct Generator<L: LlmClient> {
    llm: Arc<L>,
    renderer: PromptRenderer,
    config: GeneratorConfig,
}

impl<L: LlmClient> Generator<L> {
    pub fn new(llm: Arc<L>, config: GeneratorConfig) -> Self {
        Self {
            llm,
            renderer: PromptRenderer::new(),
            config,
        }
    }

    /// Build the request for one attempt. Pure: same inputs, same request.
    pub fn build_request(
        &self,
        spec: &TaskSpec,
        tools: &ToolSet,
        attempt: u32,
        hint: Option<&str>,
    ) -> Result<CompletionRequest> {
        let seed = spec.seed_for_attempt(attempt);
        let context = UserPromptContext {
            attempt,
            seed,
            spec_json: spec.to_pretty_json()?,
            tools: tools.iter().collect(),
        };
        let mut user = self.renderer.render_with(USER_TEMPLATE, &context)?;

        user.push_str("\n\n## Repair Hint\n");
        match hint {
            Some(hint) if !hint.trim().is_empty() => user.push_str(hint),
            _ => user.push_str(INITIAL_HINT),
        }

        Ok(CompletionRequest::new(SYSTEM_PROMPT)
            .with_user_message(user)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_seed(seed))
    }

    /// Ask the backend for a candidate.
    ///
    /// Backend errors, timeouts and replies without code all surface as
    /// `StratloopError::Generation`.
    pub async fn generate(
        &self,
        spec: &TaskSpec,
        tools: &ToolSet,
        attempt: u32,
        hint: Option<&str>,
    ) -> Result<Candidate> {
        let request = self.build_request(spec, tools, attempt, hint)?;
        debug!(
            "Generating attempt {} for {} ({} prompt chars)",
            attempt,
            spec.task_id,
            request.user_text().len()
        );

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| {
                StratloopError::Generation(format!(
                    "backend did not answer within {}ms",
                    self.config.timeout.as_millis()
                ))
            })?
            .map_err(|e| StratloopError::Generation(e.to_string()))?;

        let code = extract_code(&response.content);
        if code.is_empty() {
            return Err(StratloopError::Generation("backend returned no code".to_string()));
        }

        let candidate = Candidate::new(code);
        info!(
            "Attempt {} for {} produced {} bytes ({})",
            attempt,
            spec.task_id,
            candidate.source.len(),
            &candidate.sha256[..12]
        );
        Ok(candidate)
    }
}
