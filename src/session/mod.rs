// Chat session
// Turn history, sample prompts and the turn boundary where errors become replies


use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::BotError;
use crate::generation::{ChatMessage, ResponseGenerator};
use crate::voice::{Playback, VoiceTurnHandler};

/// Starter prompts offered until the first turn
pub const SAMPLE_PROMPTS: [&str; 4] = [
    "Who are you?",
    "What is the age of karthik?",
    "What skills does Karthik have?",
    "What certifications or courses has Karthik completed?",
];

/// User message recorded for a voice turn whose recording could not be
/// transcribed
pub const UNTRANSCRIBED_VOICE_MESSAGE: &str = "(voice message)";

/// In-memory state of one session; never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    messages: Vec<ChatMessage>,
    show_sample_prompts: bool,
}

impl Default for SessionState {
    #[inline]
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            show_sample_prompts: true,
        }
    }
}

impl SessionState {
    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sample prompts to offer, while no turn has happened yet
    #[inline]
    pub fn sample_prompts(&self) -> Option<&'static [&'static str]> {
        (self.show_sample_prompts && self.messages.is_empty()).then_some(&SAMPLE_PROMPTS[..])
    }

    /// Append a user message and its reply. Hides the sample prompts for
    /// the rest of the session.
    #[inline]
    pub fn record_turn(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ChatMessage::user(user));
        self.messages.push(ChatMessage::assistant(reply));
        self.show_sample_prompts = false;
    }
}

/// Assistant text shown for a failed turn.
///
/// The one place error kinds are turned into user-visible messages.
#[inline]
pub fn describe_turn_error(error: &BotError) -> String {
    match error {
        BotError::Auth(_) => {
            "An error occurred: the API key was rejected. Start a new session with a valid key."
                .to_string()
        }
        BotError::Retrieval(message) => {
            format!("An error occurred while searching the knowledge base: {message}")
        }
        BotError::Generation(message) => {
            format!("An error occurred while generating a response: {message}")
        }
        BotError::Transcription(message) => {
            format!("An error occurred while transcribing your voice message: {message}")
        }
        BotError::Synthesis(message) => {
            format!("An error occurred while speaking the reply: {message}")
        }
        BotError::Timeout { operation, after } => format!(
            "An error occurred: {operation} did not finish within {} seconds.",
            after.as_secs()
        ),
        BotError::Cancelled(_) => "The request was cancelled.".to_string(),
        other => format!("An error occurred: {other}"),
    }
}

/// The assistant's side of a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub failed: bool,
}

impl TurnReply {
    fn from_result(result: crate::Result<String>) -> Self {
        match result {
            Ok(text) => Self {
                text,
                failed: false,
            },
            Err(e) => {
                error!("Turn failed: {}", e);
                Self {
                    text: describe_turn_error(&e),
                    failed: true,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTurnReport {
    /// `None` when the recording could not be transcribed
    pub transcript: Option<String>,
    pub reply: TurnReply,
    /// Set when the reply was spoken
    pub playback: Option<Playback>,
    /// Why the reply could not be spoken, if it could not
    pub speech_error: Option<String>,
}

pub struct ChatSession {
    state: SessionState,
    generator: ResponseGenerator,
    voice: Option<VoiceTurnHandler>,
    cancel: CancellationToken,
}

impl ChatSession {
    /// Start a session with fresh state. Cancelling `cancel` ends everything
    /// still in flight.
    #[inline]
    pub fn new(
        generator: ResponseGenerator,
        voice: Option<VoiceTurnHandler>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state: SessionState::default(),
            generator,
            voice,
            cancel,
        }
    }

    #[inline]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[inline]
    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    /// Token for one turn. Cancelling it stops that turn only.
    #[inline]
    pub fn begin_turn(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Cancel everything still in flight
    #[inline]
    pub fn end(&self) {
        self.cancel.cancel();
    }

    /// Answer a typed (or sample) prompt. Failures become the reply.
    #[inline]
    pub async fn submit_text(&mut self, query: &str, turn: &CancellationToken) -> TurnReply {
        let reply = TurnReply::from_result(self.generator.answer(query, turn).await);
        self.state.record_turn(query, reply.text.clone());
        reply
    }

    /// Run a voice turn for a finalized recording.
    ///
    /// Both scratch files are gone when this returns.
    #[inline]
    pub async fn submit_voice(
        &mut self,
        recording: &[u8],
        turn: &CancellationToken,
    ) -> VoiceTurnReport {
        let Some(voice) = &self.voice else {
            let reply = TurnReply::from_result(Err(BotError::Config(
                "voice input is not available in this session".to_string(),
            )));
            self.state
                .record_turn(UNTRANSCRIBED_VOICE_MESSAGE, reply.text.clone());
            return VoiceTurnReport {
                transcript: None,
                reply,
                playback: None,
                speech_error: None,
            };
        };

        let scratch = match voice.scratch() {
            Ok(scratch) => scratch,
            Err(e) => {
                let reply = TurnReply::from_result(Err(e.in_stage(BotError::Transcription)));
                self.state
                    .record_turn(UNTRANSCRIBED_VOICE_MESSAGE, reply.text.clone());
                return VoiceTurnReport {
                    transcript: None,
                    reply,
                    playback: None,
                    speech_error: None,
                };
            }
        };

        let transcript = match voice.transcribe(&scratch, recording, turn).await {
            Ok(transcript) => transcript,
            Err(e) => {
                let reply = TurnReply::from_result(Err(e));
                self.state
                    .record_turn(UNTRANSCRIBED_VOICE_MESSAGE, reply.text.clone());
                return VoiceTurnReport {
                    transcript: None,
                    reply,
                    playback: None,
                    speech_error: None,
                };
            }
        };

        let reply = TurnReply::from_result(self.generator.answer(&transcript, turn).await);
        self.state.record_turn(transcript.clone(), reply.text.clone());

        let (playback, speech_error) = match voice.speak(&scratch, &reply.text, turn).await {
            Ok(playback) => (Some(playback), None),
            Err(e) => {
                warn!("Could not speak reply: {}", e);
                (None, Some(describe_turn_error(&e)))
            }
        };

        drop(scratch);
        info!("Voice turn finished");

        VoiceTurnReport {
            transcript: Some(transcript),
            reply,
            playback,
            speech_error,
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
