// In-memory stand-ins for the hosted services and the vector collection

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::database::{ChunkRecord, Collection, SearchResult};
use crate::embeddings::{Embedder, Embedding};
use crate::generation::{ChatMessage, ChatModel};
use crate::voice::{AudioPlayer, SpeechToText, TextToSpeech};
use crate::{BotError, Result};

/// Deterministic bag-of-words embedder: identical texts get identical
/// vectors, texts sharing words get nearby ones
pub(crate) struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 32 }
    }
}

impl HashEmbedder {
    pub fn vector(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0_f32; self.dimensions];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        "hash-embedder"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        Ok(self.vector(text))
    }
}

/// Embedder whose calls never finish
pub(crate) struct StalledEmbedder;

#[async_trait]
impl Embedder for StalledEmbedder {
    fn model(&self) -> &str {
        "stalled"
    }

    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
        std::future::pending().await
    }

    async fn embed_query(&self, _text: &str) -> Result<Embedding> {
        std::future::pending().await
    }
}

/// Brute-force collection held in memory. Queries fail while
/// `failures_left` is non-zero.
#[derive(Default)]
pub(crate) struct MemoryCollection {
    pub records: Mutex<Vec<ChunkRecord>>,
    pub failures_left: AtomicUsize,
}

impl MemoryCollection {
    pub fn failing(times: usize) -> Self {
        Self {
            records: Mutex::default(),
            failures_left: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        "memory"
    }

    async fn add(&self, records: Vec<ChunkRecord>) -> Result<()> {
        let mut stored = self.records.lock().expect("lock should not be poisoned");
        for record in records {
            stored.retain(|existing| existing.id != record.id);
            stored.push(record);
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], n_results: usize) -> Result<Vec<SearchResult>> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BotError::Database("collection unavailable".to_string()));
        }

        let stored = self.records.lock().expect("lock should not be poisoned");
        let mut results: Vec<SearchResult> = stored
            .iter()
            .map(|record| {
                let distance = record
                    .vector
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>();
                SearchResult {
                    id: record.id.clone(),
                    metadata: record.metadata.clone(),
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(n_results);
        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.lock().expect("lock should not be poisoned").len() as u64)
    }
}

/// Chat model that records every prompt and answers with a fixed reply
pub(crate) struct RecordingChatModel {
    pub reply: String,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingChatModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::default(),
        }
    }

    pub fn last_prompt(&self) -> Vec<ChatMessage> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .last()
            .cloned()
            .expect("a prompt should have been sent")
    }
}

#[async_trait]
impl ChatModel for RecordingChatModel {
    fn model(&self) -> &str {
        "recording"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

/// Speech-to-text that returns a fixed transcript, or fails when it is `None`
pub(crate) struct FixedTranscriber {
    pub transcript: Option<String>,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl FixedTranscriber {
    pub fn new(transcript: Option<&str>) -> Self {
        Self {
            transcript: transcript.map(str::to_string),
            seen: Mutex::default(),
        }
    }
}

#[async_trait]
impl SpeechToText for FixedTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        assert!(audio.exists(), "recording should be on disk while transcribing");
        self.seen
            .lock()
            .expect("lock should not be poisoned")
            .push(audio.to_path_buf());
        self.transcript
            .clone()
            .ok_or_else(|| BotError::Transcription("could not understand audio".to_string()))
    }
}

/// Text-to-speech that writes fixed bytes, or produces no file when `bytes`
/// is `None`
pub(crate) struct FileSynthesizer {
    pub bytes: Option<Vec<u8>>,
    pub fail: bool,
}

#[async_trait]
impl TextToSpeech for FileSynthesizer {
    async fn synthesize(&self, _text: &str, output: &Path) -> Result<()> {
        if self.fail {
            return Err(BotError::Synthesis("voice unavailable".to_string()));
        }
        if let Some(bytes) = &self.bytes {
            std::fs::write(output, bytes)?;
        }
        Ok(())
    }
}

/// Player that only records what it was asked to play
#[derive(Default)]
pub(crate) struct RecordingPlayer {
    pub played: Mutex<Vec<PathBuf>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioPlayer for RecordingPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.played
            .lock()
            .expect("lock should not be poisoned")
            .push(path.to_path_buf());
        Ok(())
    }
}

pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(5);
