
use std::borrow::Cow;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConfigError;

/// Separators tried in priority order. The empty separator splits into
/// individual characters and always applies.
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for document chunking, measured in characters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound for a chunk's length
    pub chunk_size: usize,
    /// How much trailing text of a chunk is repeated at the start of the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }
}

/// Recursive character splitter.
///
/// Text is split on the first separator it contains and pieces that are
/// still too long are split again with the remaining separators. The pieces
/// are then merged back together up to `chunk_size`. Consecutive chunks
/// share up to `chunk_overlap` characters of text.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split text into trimmed, non-empty chunks
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces = self.split_pieces(text, &self.separators);
        let chunks = self.merge_splits(&pieces);

        debug!(
            "Split {} characters ({} pieces) into {} chunks (avg {} characters)",
            char_len(text),
            pieces.len(),
            chunks.len(),
            chunks.iter().map(|c| char_len(c)).sum::<usize>() / chunks.len().max(1)
        );

        chunks
    }

    /// Break text into pieces shorter than `chunk_size`. Concatenating the
    /// pieces gives back the text.
    fn split_pieces(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator that occurs in the text
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut pieces = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size || remaining.is_empty() {
                pieces.push(piece);
            } else {
                pieces.extend(self.split_pieces(&piece, remaining));
            }
        }
        pieces
    }

    /// Greedily merge pieces into chunks of at most `chunk_size`.
    ///
    /// After a chunk is emitted the window keeps its trailing pieces, up to
    /// `chunk_overlap` characters, as the start of the next chunk. When none
    /// of them fit, the next chunk starts with the tail of the emitted chunk
    /// instead.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let chunk_overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<(Cow<'_, str>, usize)> = VecDeque::new();
        let mut total = 0;
        // The window holds text that has not been emitted yet
        let mut pending = false;

        for split in splits {
            let len = char_len(split);

            if total + len > chunk_size && !window.is_empty() {
                if total > chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, chunk_size
                    );
                }

                let emitted = if pending { join_window(&window) } else { None };
                pending = false;

                while let Some(&(_, front_len)) = window.front() {
                    if total > chunk_overlap || total + len > chunk_size {
                        total -= front_len;
                        window.pop_front();
                    } else {
                        break;
                    }
                }

                // Whitespace alone is trimmed away and would share nothing
                if window.iter().all(|(piece, _)| piece.trim().is_empty()) {
                    window.clear();
                    total = 0;
                }

                if let Some(chunk) = emitted {
                    if window.is_empty() {
                        let budget = chunk_overlap.min(chunk_size.saturating_sub(len));
                        if let Some(tail) = self.overlap_tail(&chunk, budget) {
                            let tail_len = char_len(tail);
                            window.push_back((Cow::Owned(tail.to_string()), tail_len));
                            total = tail_len;
                        }
                    }
                    chunks.push(chunk);
                }
            }

            window.push_back((Cow::Borrowed(split.as_str()), len));
            total += len;
            if !split.trim().is_empty() {
                pending = true;
            }
        }

        if pending {
            if let Some(chunk) = join_window(&window) {
                chunks.push(chunk);
            }
        }

        chunks
    }

    /// Trailing text of `chunk` to repeat at the start of the next chunk: at
    /// most `budget` characters, starting at a separator when one fits
    fn overlap_tail<'a>(&self, chunk: &'a str, budget: usize) -> Option<&'a str> {
        if budget == 0 {
            return None;
        }

        let skip = char_len(chunk).saturating_sub(budget);
        let start = chunk
            .char_indices()
            .nth(skip)
            .map_or(chunk.len(), |(i, _)| i);
        let tail = chunk.get(start..)?;

        let at_separator = self
            .separators
            .iter()
            .filter(|separator| !separator.is_empty())
            .find_map(|separator| {
                let offset = tail.find(separator.as_str())?;
                tail.get(offset..).filter(|rest| !rest.trim().is_empty())
            });

        Some(at_separator.unwrap_or(tail)).filter(|tail| !tail.trim().is_empty())
    }
}

/// Split on `separator`, attaching the separator to the start of each piece
/// that followed it. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        let piece = if i == 0 {
            part.to_string()
        } else {
            format!("{}{}", separator, part)
        };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

fn join_window(window: &VecDeque<(Cow<'_, str>, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| piece.as_ref()).collect();
    trimmed(&joined)
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Length in characters, the unit chunk sizes are measured in
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
