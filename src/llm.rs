//! LLM backend: completion trait + Anthropic Messages API client + mock.
//! Agents own their prompts; this module only moves messages and counts tokens.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One completion request. `model` is chosen per call so the cheap screening
/// passes and the drafting passes can use different tiers.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub model: String,
}

/// Completion text plus the usage counts the cost estimator needs.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

// ------------------------------------------------------------
// Anthropic Messages API client
// ------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("shopfloor-ralph/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(180))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("Missing ANTHROPIC_API_KEY env var")?;
        Ok(Self::new(api_key))
    }

    /// Override the endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: &'a [ChatMessage],
            #[serde(skip_serializing_if = "Option::is_none")]
            system: Option<&'a str>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<ContentBlock>,
            usage: Usage,
        }
        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: String,
        }
        #[derive(Deserialize)]
        struct Usage {
            input_tokens: u64,
            output_tokens: u64,
        }

        if request.messages.is_empty() {
            anyhow::bail!("messages cannot be empty");
        }

        let body = Req {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: &request.messages,
            system: request.system.as_deref(),
        };

        let resp = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API returned {status}: {text}");
        }

        let parsed: Resp = resp.json().await.context("parsing Anthropic response")?;
        let text = parsed
            .content
            .first()
            .map(|block| block.text.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            anyhow::bail!("Anthropic response content was empty");
        }

        Ok(Completion {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}

// ------------------------------------------------------------
// Mock client
// ------------------------------------------------------------

/// Returns a fixed completion; handy for local smoke runs and simple tests.
#[derive(Clone)]
pub struct MockLlm {
    pub fixed: Completion,
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        Ok(self.fixed.clone())
    }
}

// ------------------------------------------------------------
// Model-output parsing helpers
// ------------------------------------------------------------

/// Strip an optional ```/```json fence wrapper from a model response.
pub fn strip_code_fences(text: &str) -> String {
    let cleaned = text.trim();
    if !cleaned.starts_with("```") {
        return cleaned.to_string();
    }
    let mut lines: Vec<&str> = cleaned.lines().collect();
    lines.remove(0);
    if let Some(last) = lines.last() {
        if last.trim() == "```" {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Parse a response that is supposed to be a single JSON object.
pub fn parse_json_object(text: &str) -> Result<serde_json::Value> {
    let cleaned = strip_code_fences(text);
    let value: serde_json::Value =
        serde_json::from_str(&cleaned).context("Failed to parse JSON response")?;
    if !value.is_object() {
        anyhow::bail!("Expected JSON object, got {}", json_type_name(&value));
    }
    Ok(value)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Required non-empty string field, with a clear error naming the key.
pub fn required_string(value: &serde_json::Value, key: &str) -> Result<String> {
    match value.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => anyhow::bail!("{key} must be a non-empty string"),
    }
}
