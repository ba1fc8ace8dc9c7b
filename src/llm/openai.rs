//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};

use crate::config::LlmConfig;
use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, Usage};

/// Configuration for the chat client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for OpenAiConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OpenAiClient {
    /// Create a client reading the key from `api_key_env`
    pub fn from_env(api_key_env: &str, config: OpenAiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env).map_err(|_| LlmError::MissingApiKey {
            env_var: api_key_env.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Build the request body
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();

        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        for m in &request.messages {
            messages.push(json!({"role": m.role.as_str(), "content": m.content}));
        }

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": request.temperature.unwrap_or(self.config.temperature),
        });

        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| LlmError::InvalidResponse(format!("no choices in response: {}", body)))?;

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("choice has no text content".to_string()))?
            .to_string();

        let usage = body
            .get("usage")
            .map(|u| {
                Usage::new(
                    u["prompt_tokens"].as_u64().unwrap_or(0),
                    u["completion_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        self.usage.lock().unwrap_or_else(|e| e.into_inner()).add(&usage);

        Ok(CompletionResponse {
            content,
            finish_reason: choice["finish_reason"].as_str().map(str::to_string),
            usage,
        })
    }

    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        *self.usage.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        debug!("POST {} model={}", self.endpoint(), body["model"]);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    fn client() -> OpenAiClient {
        OpenAiClient::with_api_key("test-key".to_string(), OpenAiConfig::default()).unwrap()
    }

    #[test]
    fn test_config_from_llm_config() {
        let llm = LlmConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            timeout_ms: 5000,
            ..LlmConfig::default()
        };
        let config = OpenAiConfig::from(&llm);
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAiClient::from_env("STRATLOOP_TEST_KEY_THAT_IS_NEVER_SET", OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));
    }

    #[test]
    fn test_build_request_basic() {
        let client = client();
        let request = CompletionRequest::new("You write code").with_user_message("Hello");
        let body = client.build_request(&request);

        assert_eq!(body["model"], client.model());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You write code");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn test_build_request_overrides_and_seed() {
        let client = client();
        let mut request = CompletionRequest::new("")
            .with_message(Message::user("hi"))
            .with_max_tokens(100)
            .with_seed(43);
        request.model = Some("other-model".to_string());
        let body = client.build_request(&request);

        assert_eq!(body["model"], "other-model");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["seed"], 43);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_response() {
        let client = client();
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "```python\nx = 1\n```"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8}
        });
        let response = client.parse_response(body).unwrap();
        assert!(response.content.contains("x = 1"));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage, Usage::new(12, 8));
        assert_eq!(client.total_usage(), Usage::new(12, 8));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = client().parse_response(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
