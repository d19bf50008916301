
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
    pub batch_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1/".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "echo".to_string(),
            batch_size: 64,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// Directory holding the vector collection
    pub path: PathBuf,
    pub collection: String,
    /// Documents ingested by `karrybot ingest`
    pub documents: Vec<PathBuf>,
    /// Number of chunks retrieved per query
    pub top_k: usize,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("knowledge_base"),
            collection: "FAQs".to_string(),
            documents: ["short.pdf", "story.pdf", "project-3.pdf", "resume.pdf"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            top_k: 10,
        }
    }
}

/// Persona the assistant speaks as
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Name the assistant introduces itself with
    pub name: String,
    /// Person the knowledge base is about
    pub subject: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Karthik".to_string(),
            subject: "Karthik Rajan".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Where per-turn recordings and synthesized replies are written
    pub scratch_dir: Option<PathBuf>,
    /// Player command, e.g. `["mpg123", "-q"]`. The file path is appended.
    pub player: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid {0} model name (cannot be empty)")]
    InvalidModel(&'static str),
    #[error("Invalid voice: {0:?} (cannot be empty)")]
    InvalidVoice(String),
    #[error("Invalid request timeout: {0}s (must be between 1 and 600)")]
    InvalidTimeout(u64),
    #[error("Invalid collection name: {0:?} (must be 1-64 letters, digits, '-' or '_')")]
    InvalidCollectionName(String),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("Invalid audio player command: {0:?} (arguments cannot be blank)")]
    InvalidPlayer(String),
    #[error("Invalid scratch directory (cannot be empty)")]
    InvalidScratchDir,
    #[error("Invalid assistant {0} (cannot be empty)")]
    InvalidPersona(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.knowledge_base.validate()?;
        self.chunking.validate()?;
        self.assistant.validate()?;
        self.audio.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory of the persistent vector collection
    #[inline]
    pub fn knowledge_base_path(&self) -> PathBuf {
        self.resolve(&self.knowledge_base.path)
    }

    /// Documents to ingest, resolved against the config directory
    #[inline]
    pub fn document_paths(&self) -> Vec<PathBuf> {
        self.knowledge_base
            .documents
            .iter()
            .map(|path| self.resolve(path))
            .collect()
    }

    /// Directory for per-turn audio files
    #[inline]
    pub fn scratch_dir_path(&self) -> PathBuf {
        self.audio
            .scratch_dir
            .as_ref()
            .map_or_else(|| self.get_base_dir().join("scratch"), |dir| self.resolve(dir))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.get_base_dir().join(path)
        }
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;

        for (field, value) in [
            ("chat", &self.chat_model),
            ("embedding", &self.embedding_model),
            ("transcription", &self.transcription_model),
            ("speech", &self.speech_model),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidModel(field));
            }
        }

        if self.voice.trim().is_empty() {
            return Err(ConfigError::InvalidVoice(self.voice.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.request_timeout_secs));
        }

        Ok(())
    }

    /// Base URL of the API, always ending in `/` so relative endpoints join
    /// underneath it
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let mut url_str = self.base_url.trim().to_string();
        if !url_str.ends_with('/') {
            url_str.push('/');
        }
        let url = Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(url_str));
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        let temp_config = OpenAiConfig {
            base_url: base_url.clone(),
            ..self.clone()
        };
        temp_config.api_url()?;
        self.base_url = base_url;
        Ok(())
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("chat"));
        }
        self.chat_model = model;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("embedding"));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_transcription_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("transcription"));
        }
        self.transcription_model = model;
        Ok(())
    }

    pub fn set_speech_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("speech"));
        }
        self.speech_model = model;
        Ok(())
    }

    pub fn set_voice(&mut self, voice: String) -> Result<(), ConfigError> {
        if voice.trim().is_empty() {
            return Err(ConfigError::InvalidVoice(voice));
        }
        self.voice = voice;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_request_timeout_secs(&mut self, seconds: u64) -> Result<(), ConfigError> {
        if !(1..=600).contains(&seconds) {
            return Err(ConfigError::InvalidTimeout(seconds));
        }
        self.request_timeout_secs = seconds;
        Ok(())
    }
}

impl KnowledgeBaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_collection_name(&self.collection)?;

        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        Ok(())
    }

    pub fn set_collection(&mut self, collection: String) -> Result<(), ConfigError> {
        validate_collection_name(&collection)?;
        self.collection = collection;
        Ok(())
    }

    pub fn set_top_k(&mut self, top_k: usize) -> Result<(), ConfigError> {
        if !(1..=100).contains(&top_k) {
            return Err(ConfigError::InvalidTopK(top_k));
        }
        self.top_k = top_k;
        Ok(())
    }
}

impl AssistantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidPersona("name"));
        }
        if self.subject.trim().is_empty() {
            return Err(ConfigError::InvalidPersona("subject"));
        }
        Ok(())
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_player(&self.player)?;
        if let Some(dir) = &self.scratch_dir {
            validate_scratch_dir(dir)?;
        }
        Ok(())
    }

    /// Replace the player command. An empty command disables playback.
    pub fn set_player(&mut self, command: Vec<String>) -> Result<(), ConfigError> {
        validate_player(&command)?;
        self.player = command;
        Ok(())
    }

    /// `None` falls back to `scratch` under the config directory
    pub fn set_scratch_dir(&mut self, dir: Option<PathBuf>) -> Result<(), ConfigError> {
        if let Some(dir) = &dir {
            validate_scratch_dir(dir)?;
        }
        self.scratch_dir = dir;
        Ok(())
    }
}

fn validate_player(command: &[String]) -> Result<(), ConfigError> {
    if command.iter().any(|arg| arg.trim().is_empty()) {
        return Err(ConfigError::InvalidPlayer(command.join(" ")));
    }
    Ok(())
}

fn validate_scratch_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.as_os_str().is_empty() {
        return Err(ConfigError::InvalidScratchDir);
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> Result<(), ConfigError> {
    let valid = (1..=64).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidCollectionName(name.to_string()))
    }
}
