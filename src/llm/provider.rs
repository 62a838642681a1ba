//! LlmProvider — the external LLM collaborator.
//!
//! Two implementations, following the trait-plus-mock split used throughout
//! this crate's collaborators (`llm_orc.rs`'s `LlmOrcClient`/`SubprocessClient`/
//! `MockClient`): `OpenAiLlmProvider` talks to a real chat-completions endpoint,
//! `MockLlmProvider` returns preconfigured responses for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum LlmProviderError {
    #[error("LLM provider request failed: {0}")]
    Request(String),
    #[error("LLM provider returned no choices")]
    EmptyResponse,
    #[error("failed to parse structured LLM output: {0}")]
    Parse(String),
    #[error("no mock response configured for input: {0:?}")]
    MissingMockResponse(String),
}

/// Trait for calling an external LLM chat-completions API.
///
/// A single call is one request; the provider is responsible for mapping a
/// request onto whatever transport it uses. Implementations must be safe for
/// concurrent use — `LlmMap` dispatches many calls against a shared instance.
///
/// `complete_structured` takes the target type's JSON Schema as a plain
/// `serde_json::Value` rather than a generic parameter, so the trait stays
/// object-safe (`Arc<dyn LlmProvider>`) — `LlmMap` is the generic layer that
/// derives the schema from a `schemars::JsonSchema` type and parses the
/// returned JSON text back into it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt` as the user message, with an optional leading system
    /// message, and return the first choice's raw text. The extraction
    /// prompt has no system message (`None`); the two consolidation prompts
    /// each carry one.
    async fn complete_text(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String, LlmProviderError>;

    /// Send `prompt` using the provider's structured-output mode, constrained
    /// by `schema`, and return the raw JSON text of the result. No system
    /// message — the extraction prompt this is used for has none in the source.
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String, LlmProviderError>;
}

/// Production LLM provider — calls an OpenAI-compatible
/// `POST /v1/chat/completions` endpoint via `reqwest`.
pub struct OpenAiLlmProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// No per-request timeout is mandated by the core; this is the CLI's
/// default, not a core invariant.
const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

impl OpenAiLlmProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builder with only a timeout never fails"),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            temperature: 0.1,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn send(
        &self,
        system: Option<&str>,
        prompt: &str,
        response_format: Option<ResponseFormat>,
    ) -> Result<String, LlmProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmProviderError::Request(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmProviderError::Request(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmProviderError::EmptyResponse)
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlmProvider {
    async fn complete_text(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String, LlmProviderError> {
        self.send(system, prompt, None).await
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String, LlmProviderError> {
        let response_format = ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: "structured_output",
                schema,
                strict: true,
            },
        };
        self.send(None, prompt, Some(response_format)).await
    }
}

/// Mock LLM provider — returns preconfigured text responses keyed by exact
/// prompt match, and counts calls for assertions in tests (used to verify
/// cache hits make zero calls).
///
/// When a system message is present, the lookup key is `system` and `prompt`
/// joined by a NUL byte ([`mock_key`]) rather than the prompt alone, so a
/// test can assert the exact (system, prompt) pair a call site sent.
pub struct MockLlmProvider {
    responses: HashMap<String, String>,
    call_count: Mutex<usize>,
}

/// Build the lookup key `MockLlmProvider` uses for a given (system, prompt)
/// pair. Exposed so callers configuring a `MockLlmProvider` in tests can
/// construct matching keys without duplicating the join logic.
pub fn mock_key(system: Option<&str>, prompt: &str) -> String {
    match system {
        Some(system) => format!("{system}\u{0}{prompt}"),
        None => prompt.to_string(),
    }
}

impl MockLlmProvider {
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete_text(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String, LlmProviderError> {
        *self.call_count.lock().unwrap() += 1;
        let key = mock_key(system, prompt);
        self.responses
            .get(&key)
            .cloned()
            .ok_or(LlmProviderError::MissingMockResponse(key))
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        _schema: serde_json::Value,
    ) -> Result<String, LlmProviderError> {
        *self.call_count.lock().unwrap() += 1;
        self.responses
            .get(prompt)
            .cloned()
            .ok_or_else(|| LlmProviderError::MissingMockResponse(prompt.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_configured_text() {
        let mut responses = HashMap::new();
        responses.insert("prompt-a".to_string(), "response-a".to_string());
        let provider = MockLlmProvider::new(responses);

        let result = provider.complete_text(None, "prompt-a").await.unwrap();
        assert_eq!(result, "response-a");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_provider_errors_on_missing_prompt() {
        let provider = MockLlmProvider::new(HashMap::new());
        let err = provider.complete_text(None, "missing").await.unwrap_err();
        assert!(matches!(err, LlmProviderError::MissingMockResponse(_)));
    }

    #[tokio::test]
    async fn mock_provider_distinguishes_same_prompt_by_system_message() {
        // Two calls with the same user prompt but different system personas
        // must not collide — each needs its own configured response.
        let mut responses = HashMap::new();
        responses.insert(
            mock_key(Some("persona-a"), "prompt-a"),
            "response-for-a".to_string(),
        );
        responses.insert(
            mock_key(Some("persona-b"), "prompt-a"),
            "response-for-b".to_string(),
        );
        let provider = MockLlmProvider::new(responses);

        let a = provider
            .complete_text(Some("persona-a"), "prompt-a")
            .await
            .unwrap();
        let b = provider
            .complete_text(Some("persona-b"), "prompt-a")
            .await
            .unwrap();

        assert_eq!(a, "response-for-a");
        assert_eq!(b, "response-for-b");
    }

    #[tokio::test]
    async fn mock_provider_returns_structured_json_verbatim() {
        let mut responses = HashMap::new();
        responses.insert("prompt-a".to_string(), r#"{"value": 42}"#.to_string());
        let provider = MockLlmProvider::new(responses);

        let result = provider
            .complete_structured("prompt-a", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result, r#"{"value": 42}"#);
    }
}
