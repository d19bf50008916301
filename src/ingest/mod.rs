// Ingestion pipeline
// load -> split -> embed -> store, one document at a time

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::database::{ChunkMetadata, ChunkRecord, Collection};
use crate::deadline::with_deadline;
use crate::documents::DocumentLoader;
use crate::embeddings::{Embedder, TextSplitter};
use crate::{BotError, Result};

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents_loaded: usize,
    /// Documents that could not be loaded, with the reason
    pub documents_failed: Vec<(PathBuf, String)>,
    pub chunks_stored: usize,
}

/// Content-derived chunk id: the same chunk of the same document always
/// gets the same id
#[inline]
pub fn chunk_id(source: &str, chunk_index: usize, text: &str) -> String {
    let name = format!("{source}\0{chunk_index}\0{text}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

pub struct Ingester {
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    collection: Arc<dyn Collection>,
    splitter: TextSplitter,
    batch_size: usize,
    timeout: Duration,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Ingester {
    #[inline]
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        collection: Arc<dyn Collection>,
        splitter: TextSplitter,
        batch_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            loader,
            embedder,
            collection,
            splitter,
            batch_size: batch_size.max(1),
            timeout,
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Stop the run when `cancel` fires
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Draw a progress bar on an attended terminal
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Ingest every document in `paths`.
    ///
    /// A document that fails to load is logged, reported and skipped.
    /// Embedding or storage failures abort the run; chunks stored before the
    /// failure stay stored.
    #[inline]
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        info!(
            "Ingesting {} documents into collection {}",
            paths.len(),
            self.collection.name()
        );

        let bar = if self.show_progress && console::user_attended_stderr() {
            ProgressBar::new(paths.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut report = IngestReport::default();

        for path in paths {
            bar.set_message(path.display().to_string());

            match self.ingest_document(path).await {
                Ok(chunks) => {
                    report.documents_loaded += 1;
                    report.chunks_stored += chunks;
                }
                Err(BotError::Load { path, message }) => {
                    error!("Failed to load {}: {}", path.display(), message);
                    report.documents_failed.push((path, message));
                }
                Err(e) => {
                    bar.abandon_with_message(format!("failed on {}", path.display()));
                    return Err(e);
                }
            }

            bar.inc(1);
        }

        bar.finish_with_message("done");
        info!(
            "Ingestion finished: {} documents loaded, {} failed, {} chunks stored",
            report.documents_loaded,
            report.documents_failed.len(),
            report.chunks_stored
        );
        Ok(report)
    }

    /// Load, split, embed and store one document. Returns the number of
    /// chunks stored.
    async fn ingest_document(&self, path: &Path) -> Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(BotError::Cancelled("ingestion".to_string()));
        }

        let pages = self.loader.load(path).await?;
        let text = pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = self.splitter.split_text(&text);
        debug!(
            "Split {} ({} pages) into {} chunks",
            path.display(),
            pages.len(),
            chunks.len()
        );

        if chunks.is_empty() {
            info!("No text found in {}", path.display());
            return Ok(0);
        }

        let source = path.display().to_string();
        let created_at = Utc::now().to_rfc3339();
        let mut stored = 0;

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let vectors = with_deadline(
                "document embedding",
                self.timeout,
                &self.cancel,
                self.embedder.embed_documents(batch),
            )
            .await
            .map_err(|e| e.in_stage(BotError::Embedding))?;

            if vectors.len() != batch.len() {
                return Err(BotError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            let first_index = batch_index * self.batch_size;
            let records = batch
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(offset, (text, vector))| {
                    let chunk_index = first_index + offset;
                    ChunkRecord {
                        id: chunk_id(&source, chunk_index, text),
                        vector,
                        metadata: ChunkMetadata {
                            content: text.clone(),
                            source: source.clone(),
                            chunk_index: chunk_index as u32,
                            created_at: created_at.clone(),
                        },
                    }
                })
                .collect();

            self.collection.add(records).await?;
            stored += batch.len();
        }

        info!("Stored {} chunks from {}", stored, path.display());
        Ok(stored)
    }
}
