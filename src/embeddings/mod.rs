// Embeddings module
// Embedding model contract and document chunking

pub mod chunking;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{ChunkingConfig, TextSplitter, char_len};

/// A dense vector representation of a text
pub type Embedding = Vec<f32>;

/// Hosted or local model that turns text into embeddings.
///
/// Ingestion and retrieval must use the same model: vectors from different
/// models live in different spaces and cannot be compared.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model
    fn model(&self) -> &str;

    /// Embed a batch of document texts, preserving order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single query text
    async fn embed_query(&self, text: &str) -> Result<Embedding>;
}
