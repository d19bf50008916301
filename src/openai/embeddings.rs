use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::OpenAiClient;
use crate::deadline::run_blocking;
use crate::embeddings::{Embedder, Embedding};
use crate::{BotError, Result};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let response_text = self.post_json("embeddings", &request)?;
        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| BotError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        if response.data.len() != texts.len() {
            return Err(BotError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    #[inline]
    fn model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let client = self.clone();
        let texts = texts.to_vec();
        run_blocking(move || {
            let mut results = Vec::with_capacity(texts.len());
            for batch in texts.chunks(client.batch_size as usize) {
                results.extend(client.embed_batch(batch)?);
            }
            debug!("Generated {} embeddings total", results.len());
            Ok(results)
        })
        .await
        .map_err(|e| e.in_stage(BotError::Embedding))
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed_documents(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| BotError::Embedding("No embedding returned for query".to_string()))
    }
}
