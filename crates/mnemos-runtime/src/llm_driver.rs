//! [`LlmDriver`] – OpenAI-compatible generation interface.
//!
//! Communicates with a model server that exposes an OpenAI-compatible
//! `/v1/chat/completions` endpoint, such as [Ollama](https://ollama.com)
//! (`http://localhost:11434`) or a hosted provider.
//!
//! [`Generator`] is the seam `infer` depends on; [`ProviderRouter`] is a
//! [`Generator`] that forwards each call to the backend configured for the
//! requested model id.
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_runtime::llm_driver::{ChatMessage, LlmDriver, Role};
//!
//! let driver = LlmDriver::new("http://localhost:11434");
//!
//! let messages = vec![
//!     ChatMessage { role: Role::System, content: "Answer inside <output> tags.".into() },
//!     ChatMessage { role: Role::User, content: "<input>...</input>".into() },
//! ];
//!
//! // Requires a running Ollama instance – skipped in unit tests.
//! // let reply = driver.complete(&messages, "llama3", Deadline::none()).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use mnemos_types::{Deadline, MnemosError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{post_json, trim_base};

// ─────────────────────────────────────────────────────────────────────────────
// Generator seam
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt + model id → generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str, deadline: Deadline) -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for an OpenAI-compatible chat-completions endpoint.
///
/// Construct once and reuse; the model is chosen per call.
pub struct LlmDriver {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDriver")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl LlmDriver {
    /// Create a driver pointing at `base_url` (e.g. `"http://localhost:11434"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Send `messages` to `model` and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// [`MnemosError::Provider`] if the request fails or the response shape is
    /// unexpected, [`MnemosError::DeadlineExceeded`] if `deadline` passes.
    pub async fn complete(&self, messages: &[ChatMessage], model: &str, deadline: Deadline) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };
        let response: ChatResponse =
            post_json(&self.client, &url, self.api_key.as_deref(), &body, "generation", deadline).await?;
        let reply = first_choice(response)?;
        debug!(model, chars = reply.len(), "completion received");
        Ok(reply)
    }
}

fn first_choice(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| MnemosError::provider("generation", "empty choices array"))
}

#[async_trait]
impl Generator for LlmDriver {
    async fn generate(&self, prompt: &str, model: &str, deadline: Deadline) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)], model, deadline).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProviderRouter
// ─────────────────────────────────────────────────────────────────────────────

/// Whether `pattern` (an exact model id, or a `prefix*` wildcard) covers
/// `model`.
pub fn model_matches(pattern: &str, model: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => model.starts_with(prefix),
        None => pattern == model,
    }
}

struct Route {
    patterns: Vec<String>,
    generator: Arc<dyn Generator>,
}

/// Picks a generation backend by requested model id.
///
/// An exact pattern beats any wildcard; among wildcards the longest prefix
/// wins; ties go to the route registered first.
#[derive(Default)]
pub struct ProviderRouter {
    routes: Vec<Route>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| &r.patterns))
            .finish()
    }
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every model matching one of `patterns` with `generator`.
    pub fn route<I, S>(mut self, patterns: I, generator: Arc<dyn Generator>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes.push(Route {
            patterns: patterns.into_iter().map(Into::into).collect(),
            generator,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The backend serving `model`.
    pub fn select(&self, model: &str) -> Result<&Arc<dyn Generator>> {
        let mut best: Option<(usize, &Route)> = None;
        for route in &self.routes {
            for pattern in &route.patterns {
                if !model_matches(pattern, model) {
                    continue;
                }
                // Exact ids rank above every prefix length.
                let rank = if pattern.ends_with('*') {
                    pattern.len() - 1
                } else {
                    usize::MAX
                };
                if best.is_none_or(|(r, _)| rank > r) {
                    best = Some((rank, route));
                }
            }
        }
        best.map(|(_, route)| &route.generator).ok_or_else(|| {
            MnemosError::provider("router", format!("no provider configured for model '{model}'"))
        })
    }
}

#[async_trait]
impl Generator for ProviderRouter {
    async fn generate(&self, prompt: &str, model: &str, deadline: Deadline) -> Result<String> {
        self.select(model)?.generate(prompt, model, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replies with a fixed label so tests can tell backends apart.
    struct Fixed(&'static str);

    #[async_trait]
    impl Generator for Fixed {
        async fn generate(&self, _prompt: &str, _model: &str, _deadline: Deadline) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    // ── messages ─────────────────────────────────────────────────────────────

    #[test]
    fn chat_message_role_variants_serialize() {
        let roles = [
            (Role::System, "system"),
            (Role::User, "user"),
            (Role::Assistant, "assistant"),
        ];
        for (role, expected) in roles {
            let msg = ChatMessage {
                role,
                content: String::new(),
            };
            let json = serde_json::to_string(&msg).unwrap();
            assert!(json.contains(expected));
        }
    }

    #[test]
    fn request_body_is_non_streaming() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "llama3",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn first_choice_content_is_returned() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"<output/>"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(response).unwrap(), "<output/>");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice(empty).is_err());
    }

    #[test]
    fn driver_debug_redacts_key() {
        let driver = LlmDriver::new("http://localhost:11434/").with_api_key("sk-123");
        let dbg = format!("{driver:?}");
        assert!(!dbg.contains("sk-123"));
        assert!(dbg.contains("http://localhost:11434\""));
    }

    // ── routing ──────────────────────────────────────────────────────────────

    #[test]
    fn pattern_matching() {
        assert!(model_matches("gpt-4o", "gpt-4o"));
        assert!(!model_matches("gpt-4o", "gpt-4o-mini"));
        assert!(model_matches("gpt-*", "gpt-4o-mini"));
        assert!(model_matches("*", "anything"));
        assert!(!model_matches("claude-*", "gpt-4o"));
    }

    #[tokio::test]
    async fn exact_beats_longest_prefix_beats_shorter_prefix() {
        let router = ProviderRouter::new()
            .route(["*"], Arc::new(Fixed("fallback")))
            .route(["gpt-*"], Arc::new(Fixed("openai")))
            .route(["gpt-4o-*", "local-model"], Arc::new(Fixed("mini")))
            .route(["gpt-4o-mini"], Arc::new(Fixed("exact")));

        let ask = |model: &'static str| {
            let router = &router;
            async move { router.generate("p", model, Deadline::none()).await.unwrap() }
        };
        assert_eq!(ask("gpt-4o-mini").await, "exact");
        assert_eq!(ask("gpt-4o-2024").await, "mini");
        assert_eq!(ask("gpt-3.5").await, "openai");
        assert_eq!(ask("llama3").await, "fallback");
        assert_eq!(ask("local-model").await, "mini");
    }

    #[tokio::test]
    async fn unknown_model_is_a_provider_error() {
        let router = ProviderRouter::new().route(["llama*"], Arc::new(Fixed("ollama")));
        let err = router.generate("p", "gpt-4o", Deadline::none()).await.unwrap_err();
        assert!(matches!(err, MnemosError::Provider { ref provider, .. } if provider == "router"));
    }
}
