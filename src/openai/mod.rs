// Hosted model client
// One blocking HTTP agent shared by the embedding, chat and audio endpoints


mod audio;
mod chat;
mod embeddings;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OpenAiConfig;
use crate::deadline::run_blocking;
use crate::{BotError, Result};

/// Upper bound for binary response bodies (synthesized speech)
const MAX_AUDIO_BYTES: u64 = 50 * 1024 * 1024;

/// API credential held in memory only. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for ApiKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: ApiKey,
    agent: ureq::Agent,
    chat_model: String,
    embedding_model: String,
    transcription_model: String,
    speech_model: String,
    voice: String,
    batch_size: u32,
    timeout: Duration,
}

impl OpenAiClient {
    /// Build a client without contacting the API
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: ApiKey) -> Result<Self> {
        if api_key.is_empty() {
            return Err(BotError::Auth("no API key was provided".to_string()));
        }

        let base_url = config
            .api_url()
            .map_err(|e| BotError::Config(e.to_string()))?;

        let timeout = config.request_timeout();
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            agent,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            transcription_model: config.transcription_model.clone(),
            speech_model: config.speech_model.clone(),
            voice: config.voice.clone(),
            batch_size: config.batch_size,
            timeout,
        })
    }

    /// Build a client and check the credential against the API
    #[inline]
    pub async fn connect(config: &OpenAiConfig, api_key: ApiKey) -> Result<Self> {
        let client = Self::new(config, api_key)?;
        client.verify().await?;
        Ok(client)
    }

    /// Lightweight capability probe: list the available models.
    ///
    /// A rejected key is an [`BotError::Auth`]; anything else that goes wrong
    /// is reported as a network error.
    #[inline]
    pub async fn verify(&self) -> Result<()> {
        let client = self.clone();
        run_blocking(move || {
            let url = client.endpoint("models")?;
            debug!("Verifying API key against {}", url);

            match client
                .agent
                .get(url.as_str())
                .header("Authorization", client.api_key.bearer())
                .call()
            {
                Ok(_) => {
                    info!("API key accepted by {}", client.base_url);
                    Ok(())
                }
                Err(ureq::Error::StatusCode(code @ (401 | 403))) => {
                    warn!("API key rejected with status {}", code);
                    Err(BotError::Auth(format!(
                        "the API key was rejected (HTTP {code})"
                    )))
                }
                Err(e) => Err(client.classify(e)),
            }
        })
        .await
    }

    /// Per-request timeout applied by the HTTP agent
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BotError::Config(format!("Failed to build {path} URL: {e}")))
    }

    /// POST a JSON body and return the response text
    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)
            .map_err(|e| BotError::Other(anyhow::anyhow!("Failed to serialize request: {e}")))?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        self.agent
            .post(url.as_str())
            .header("Authorization", self.api_key.bearer())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| self.classify(e))
    }

    /// POST a JSON body and return the raw response bytes
    fn post_json_for_bytes<T: Serialize>(&self, path: &str, body: &T) -> Result<Vec<u8>> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)
            .map_err(|e| BotError::Other(anyhow::anyhow!("Failed to serialize request: {e}")))?;

        debug!("POST {} expecting binary response", url);

        self.agent
            .post(url.as_str())
            .header("Authorization", self.api_key.bearer())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| {
                resp.body_mut()
                    .with_config()
                    .limit(MAX_AUDIO_BYTES)
                    .read_to_vec()
            })
            .map_err(|e| self.classify(e))
    }

    /// POST a pre-encoded multipart body and return the response text
    fn post_multipart(&self, path: &str, boundary: &str, body: &[u8]) -> Result<String> {
        let url = self.endpoint(path)?;

        debug!("POST {} (multipart, {} bytes)", url, body.len());

        self.agent
            .post(url.as_str())
            .header("Authorization", self.api_key.bearer())
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| self.classify(e))
    }

    /// Map a transport failure onto an error kind. Nothing is retried.
    fn classify(&self, error: ureq::Error) -> BotError {
        match error {
            ureq::Error::StatusCode(code @ (401 | 403)) => {
                warn!("Request rejected with status {}", code);
                BotError::Auth(format!("the API key was rejected (HTTP {code})"))
            }
            ureq::Error::StatusCode(code) => {
                warn!("Request failed with status {}", code);
                BotError::Network(format!("HTTP error {code}"))
            }
            ureq::Error::Timeout(_) => BotError::Timeout {
                operation: "HTTP request".to_string(),
                after: self.timeout,
            },
            other => {
                warn!("Transport error: {}", other);
                BotError::Network(other.to_string())
            }
        }
    }
}
