//! Backend providers for chat, vision, and embedding.
//!
//! Providers are explicit dependency-injected handles constructed per
//! request and passed into the orchestration entry points, never
//! module-level singletons. Tests swap in scripted fakes.

mod openai_embedder;
mod openai_llm;

pub use openai_embedder::OpenAiEmbedder;
pub use openai_llm::OpenAiLlm;

use crate::artifacts::{ArtifactStore, LocalArtifactStore};
use crate::config::Settings;
use crate::error::Result;
use crate::search::{RestSearchProvider, SearchProvider};
use async_openai::config::OpenAIConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Request timeout for backend clients when settings do not name one.
pub(crate) const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

/// OpenAI client with an explicit wall-clock request timeout.
///
/// The agent loop relies on bounded retries rather than hung connections,
/// so every request carries one.
pub(crate) fn openai_client(timeout: Duration) -> async_openai::Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    async_openai::Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// One part of a chat message: plain text or an inline image.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    ImageUrl { url: String, high_detail: bool },
}

impl ContentPart {
    /// Data-URL image part for a base64 JPEG/PNG frame.
    pub fn frame(base64_data: &str, high_detail: bool) -> Self {
        ContentPart::ImageUrl {
            url: format!("data:image/jpeg;base64,{}", base64_data),
            high_detail,
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Tool descriptor consumed by the model for tool selection.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the named parameters.
    pub parameters: serde_json::Value,
}

/// Provider-agnostic chat message.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    System(String),
    User(Vec<ContentPart>),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

impl ChatMessage {
    /// Plain-text user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        ChatMessage::User(vec![ContentPart::Text(text.into())])
    }
}

/// One chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask the backend for a structured JSON object response.
    pub json_response: bool,
}

/// Outcome of one chat completion.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatOutcome {
    /// Content-only outcome.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Trait for chat/vision model backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome>;
}

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// The full provider bundle one invocation runs against.
///
/// Each invocation owns its clone of the bundle; the handles themselves are
/// shared-nothing or internally synchronized, so concurrent invocations for
/// different videos cannot cross-contaminate.
#[derive(Clone)]
pub struct Providers {
    /// Reasoning model for planner and critic turns.
    pub llm: Arc<dyn LlmProvider>,
    /// Vision-capable model for frame queries.
    pub vision: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn Embedder>,
    pub search: Arc<dyn SearchProvider>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl Providers {
    /// Construct the default OpenAI-backed bundle from settings.
    ///
    /// Construction failures here are loop-level setup failures: they are
    /// raised before any turn executes.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = std::env::var(&settings.search.api_key_env).ok();

        Ok(Self {
            llm: Arc::new(OpenAiLlm::new(
                &settings.llm.model,
                settings.llm.timeout_seconds,
            )),
            vision: Arc::new(OpenAiLlm::new(
                &settings.llm.vision_model,
                settings.llm.timeout_seconds,
            )),
            embedder: Arc::new(OpenAiEmbedder::new(
                &settings.embedding.model,
                settings.embedding.dimensions as usize,
            )),
            search: Arc::new(RestSearchProvider::new(&settings.search.endpoint, api_key)),
            artifacts: Arc::new(LocalArtifactStore::new(&settings.artifact_dir())?),
        })
    }
}
