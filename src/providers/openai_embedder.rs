//! OpenAI embeddings implementation.

use super::{openai_client, Embedder, DEFAULT_CLIENT_TIMEOUT};
use crate::error::{GlimtError, Result};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::instrument;

/// OpenAI-based embedder.
pub struct OpenAiEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Create an embedder for the given model and dimensionality.
    pub fn new(model: &str, dimensions: usize) -> Self {
        Self {
            client: openai_client(DEFAULT_CLIENT_TIMEOUT),
            model: model.to_string(),
            dimensions,
        }
    }
}

impl Default for OpenAiEmbedder {
    fn default() -> Self {
        Self::new("text-embedding-3-small", 1536)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| GlimtError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| GlimtError::OpenAI(format!("Embedding API error: {}", e)))?;

        response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| GlimtError::Embedding("Empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
