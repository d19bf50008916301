// Response generation
// Prompt assembly over retrieved context and the chat-completion contract

pub mod prompt;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AssistantConfig;
use crate::deadline::with_deadline;
use crate::retrieval::Retriever;
use crate::{BotError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Hosted chat-completion model
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    /// One completion for the ordered, role-tagged messages
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Answers a query from retrieved context
pub struct ResponseGenerator {
    retriever: Retriever,
    chat_model: Arc<dyn ChatModel>,
    system_prompt: String,
    timeout: Duration,
}

impl ResponseGenerator {
    #[inline]
    pub fn new(
        retriever: Retriever,
        chat_model: Arc<dyn ChatModel>,
        assistant: &AssistantConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            chat_model,
            system_prompt: prompt::system_prompt(assistant),
            timeout,
        }
    }

    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Retrieve context for `query` and ask the chat model to answer it
    #[inline]
    pub async fn answer(&self, query: &str, cancel: &CancellationToken) -> Result<String> {
        let context = self.retriever.retrieve(query, cancel).await?;
        debug!("Answering with {} context chunks", context.len());

        let messages = prompt::build_messages(&self.system_prompt, &context, query);

        let reply = with_deadline(
            "chat completion",
            self.timeout,
            cancel,
            self.chat_model.complete(&messages),
        )
        .await
        .map_err(|e| e.in_stage(BotError::Generation))?;

        info!(
            "Generated reply of {} characters with {}",
            reply.len(),
            self.chat_model.model()
        );
        Ok(reply)
    }
}
