use super::ChatMessage;
use crate::config::AssistantConfig;

/// Context used when retrieval found nothing
pub const NO_CONTEXT_SENTINEL: &str = "No relevant information found.";

/// Join retrieved texts into one context block
#[inline]
pub fn build_context(chunks: &[String]) -> String {
    if chunks.is_empty() {
        NO_CONTEXT_SENTINEL.to_string()
    } else {
        chunks.join("\n")
    }
}

/// Persona instruction: greet politely, give canned answers to identity and
/// capability questions, otherwise answer about the subject from context
#[inline]
pub fn system_prompt(assistant: &AssistantConfig) -> String {
    let AssistantConfig { name, subject } = assistant;
    format!(
        "You are {subject}'s personal AI assistant and your name is {name}. \
If a user greets you (e.g., 'Hello', 'Hi', 'Hey'), respond politely.\n\
If a user asks who you are (e.g., 'Who are you?', 'Tell me about yourself', 'Introduce yourself'), respond with:\n\
'I am {subject}'s personal assistant. I can answer questions about him based on the information I have.'\n\
If a user asks what you can do (e.g., 'What can you do?', 'How can you help me?', 'What is your purpose?'), respond with:\n\
'I can provide information about {subject}. Feel free to ask about him.' \
Your purpose is to provide information about {name} based on the given knowledge base.\n\
If a user asks about {name}, respond using the available information."
    )
}

/// The system instruction followed by the context-and-question user message
#[inline]
pub fn build_messages(system_prompt: &str, chunks: &[String], query: &str) -> Vec<ChatMessage> {
    let context = build_context(chunks);
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!("Context: {context}\n\nQuestion: {query}")),
    ]
}
