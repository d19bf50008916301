// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

/// Chunk record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Content-derived identifier, stable across re-ingestion
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata stored alongside each embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The chunk text
    pub content: String,
    /// Document the chunk was split from
    pub source: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// RFC 3339 timestamp of ingestion
    pub created_at: String,
}
