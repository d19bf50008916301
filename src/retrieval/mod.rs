
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::database::Collection;
use crate::deadline::with_deadline;
use crate::embeddings::Embedder;
use crate::{BotError, Result};

/// Finds the stored chunks nearest to a query.
///
/// Must use the same embedder as ingestion. No relevance threshold is
/// applied and nothing is retried.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    collection: Arc<dyn Collection>,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        collection: Arc<dyn Collection>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            collection,
            top_k,
            timeout,
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Texts of the `top_k` nearest chunks, nearest first
    #[inline]
    pub async fn retrieve(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        if query.trim().is_empty() {
            return Err(BotError::Retrieval("query is empty".to_string()));
        }

        let vector = with_deadline(
            "query embedding",
            self.timeout,
            cancel,
            self.embedder.embed_query(query),
        )
        .await
        .map_err(|e| e.in_stage(BotError::Retrieval))?;

        let results = with_deadline(
            "collection query",
            self.timeout,
            cancel,
            self.collection.query(&vector, self.top_k),
        )
        .await
        .map_err(|e| e.in_stage(BotError::Retrieval))?;

        debug!(
            "Retrieved {} chunks from {} for query",
            results.len(),
            self.collection.name()
        );

        Ok(results
            .into_iter()
            .map(|result| result.metadata.content)
            .collect())
    }
}
