use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::OpenAiClient;
use crate::deadline::run_blocking;
use crate::voice::{SpeechToText, TextToSpeech};
use crate::{BotError, Result};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

/// Encode a `multipart/form-data` body with the `model` field and one file part
pub(super) fn multipart_body(boundary: &str, model: &str, file_name: &str, audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(audio.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\n{model}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: audio/mpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let client = self.clone();
        let audio = audio.to_path_buf();
        run_blocking(move || {
            let bytes = std::fs::read(&audio)?;
            debug!("Transcribing {} ({} bytes)", audio.display(), bytes.len());

            let boundary = format!("karrybot-{}", Uuid::new_v4().simple());
            let file_name = audio
                .file_name()
                .map_or_else(|| "input.mp3".to_string(), |name| name.to_string_lossy().into_owned());
            let body = multipart_body(&boundary, &client.transcription_model, &file_name, &bytes);

            let response_text = client.post_multipart("audio/transcriptions", &boundary, &body)?;
            let response: TranscriptionResponse = serde_json::from_str(&response_text)
                .map_err(|e| BotError::Transcription(format!("Failed to parse transcript: {e}")))?;

            debug!("Transcript has {} characters", response.text.len());
            Ok(response.text)
        })
        .await
        .map_err(|e| e.in_stage(BotError::Transcription))
    }
}

#[async_trait]
impl TextToSpeech for OpenAiClient {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        let client = self.clone();
        let text = text.to_string();
        let output: PathBuf = output.to_path_buf();
        run_blocking(move || {
            debug!(
                "Synthesizing {} characters with voice {}",
                text.len(),
                client.voice
            );

            let request = SpeechRequest {
                model: &client.speech_model,
                voice: &client.voice,
                input: &text,
                response_format: "mp3",
            };
            let audio = client.post_json_for_bytes("audio/speech", &request)?;
            std::fs::write(&output, &audio)?;

            debug!("Wrote {} bytes of speech to {}", audio.len(), output.display());
            Ok(())
        })
        .await
        .map_err(|e| e.in_stage(BotError::Synthesis))
    }
}
