// Document loading
// Turns files on disk into page texts for the ingestion pipeline


mod pdf;

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::deadline::run_blocking;
use crate::{BotError, Result};

pub use pdf::split_pages;

/// One page of extracted text, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the pages of the document at `path`. Failures are
    /// [`BotError::Load`].
    async fn load(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Loads PDFs through text extraction and reads text and Markdown files
/// directly, as a single page
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }
}

fn load_error(path: &Path, message: impl Into<String>) -> BotError {
    BotError::Load {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let kind = DocumentKind::from_path(path)
            .ok_or_else(|| load_error(path, "unsupported document type"))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| load_error(path, e.to_string()))?;

        debug!("Read {} bytes from {}", bytes.len(), path.display());

        let texts = match kind {
            DocumentKind::Pdf => {
                let owned_path = path.to_path_buf();
                // Malformed PDFs can make the extractor panic; that surfaces
                // here as a failed blocking task
                run_blocking(move || {
                    pdf::extract_pages(&bytes).map_err(|message| load_error(&owned_path, message))
                })
                .await
                .map_err(|e| match e {
                    BotError::Load { .. } => e,
                    other => load_error(path, other.to_string()),
                })?
            }
            DocumentKind::Text => {
                let text = String::from_utf8(bytes)
                    .map_err(|_| load_error(path, "file is not valid UTF-8"))?;
                vec![text]
            }
        };

        let pages: Vec<Page> = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Page {
                number: index + 1,
                text,
            })
            .collect();

        debug!("Loaded {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}
