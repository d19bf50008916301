// Database module
// Persistent vector collection behind the `Collection` contract

pub mod lancedb;

use async_trait::async_trait;

use crate::Result;

pub use self::lancedb::vector_store::{SearchResult, VectorStore};
pub use self::lancedb::{ChunkMetadata, ChunkRecord};

/// Named persistent set of (chunk, embedding) pairs with nearest-neighbour
/// lookup.
///
/// Ids are unique: adding a record whose id is already stored replaces the
/// stored row.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Store records, replacing rows that share an id
    async fn add(&self, records: Vec<ChunkRecord>) -> Result<()>;

    /// The `n_results` nearest records, nearest first. Empty when nothing is
    /// stored.
    async fn query(&self, vector: &[f32], n_results: usize) -> Result<Vec<SearchResult>>;

    async fn count(&self) -> Result<u64>;
}
