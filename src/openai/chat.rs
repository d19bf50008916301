use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::OpenAiClient;
use crate::deadline::run_blocking;
use crate::generation::{ChatMessage, ChatModel};
use crate::{BotError, Result};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiClient {
    #[inline]
    fn model(&self) -> &str {
        &self.chat_model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        run_blocking(move || {
            debug!(
                "Requesting completion from {} with {} messages",
                client.chat_model,
                messages.len()
            );

            let request = CompletionRequest {
                model: &client.chat_model,
                messages: &messages,
            };
            let response_text = client.post_json("chat/completions", &request)?;
            let response: CompletionResponse = serde_json::from_str(&response_text).map_err(
                |e| BotError::Generation(format!("Failed to parse completion response: {e}")),
            )?;

            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| BotError::Generation("The model returned no content".to_string()))
        })
        .await
        .map_err(|e| e.in_stage(BotError::Generation))
    }
}
