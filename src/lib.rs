use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl BotError {
    /// Re-tag an error as belonging to a pipeline stage. Rejected keys,
    /// timeouts, cancellations and errors already of that stage keep their
    /// kind.
    #[inline]
    #[must_use]
    pub fn in_stage(self, stage: fn(String) -> Self) -> Self {
        if std::mem::discriminant(&self) == std::mem::discriminant(&stage(String::new())) {
            return self;
        }
        match self {
            Self::Auth(_) | Self::Timeout { .. } | Self::Cancelled(_) => self,
            other => stage(other.to_string()),
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod deadline;
pub mod documents;
pub mod embeddings;
pub mod generation;
pub mod ingest;
pub mod openai;
pub mod retrieval;
pub mod session;
pub mod voice;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;
