//! OpenAI embeddings implementation.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{KursdeskError, Result};
use crate::openai::{create_client, request_timeout};
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum number of inputs sent in one embeddings request.
const BATCH_SIZE: usize = 100;

/// Embedder backed by the OpenAI embeddings endpoint.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Self {
        debug!(
            "OpenAI embedder {} ({} dims, {}s timeout)",
            settings.model, settings.dimensions, settings.timeout_secs
        );
        Self {
            client: create_client(request_timeout(settings.timeout_secs)),
            model: settings.model.clone(),
            dimensions: settings.dimensions as usize,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(batch.to_vec()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| KursdeskError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| KursdeskError::Embedding(format!("Embedding API error: {}", e)))?;

        if response.data.len() != batch.len() {
            return Err(KursdeskError::Embedding(format!(
                "Asked for {} embeddings, received {}",
                batch.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| KursdeskError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            vectors.extend(self.request_batch(batch).await?);
        }
        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
