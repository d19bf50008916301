// Voice turns
// Speech-to-text in, text-to-speech out, with per-turn scratch files

pub mod playback;


use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::deadline::with_deadline;
use crate::{BotError, Result};

pub use playback::{CommandPlayer, SilentPlayer};

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcript of the recording stored at `audio`
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into an audio file at `output`
    async fn synthesize(&self, text: &str, output: &Path) -> Result<()>;
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playing the file. Returns once playback has started.
    async fn play(&self, path: &Path) -> Result<()>;
}

/// The two scratch files of one voice turn. Both are removed when the guard
/// is dropped, whichever way the turn ended.
#[derive(Debug)]
pub struct ScratchFiles {
    recording: PathBuf,
    reply: PathBuf,
}

impl ScratchFiles {
    /// Reserve uniquely named files inside `dir`. Nothing is written yet.
    #[inline]
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let turn = Uuid::new_v4().simple().to_string();
        Ok(Self {
            recording: dir.join(format!("input-{turn}.mp3")),
            reply: dir.join(format!("reply-{turn}.mp3")),
        })
    }

    #[inline]
    pub fn recording(&self) -> &Path {
        &self.recording
    }

    #[inline]
    pub fn reply(&self) -> &Path {
        &self.reply
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in [&self.recording, &self.reply] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}

/// Outcome of speaking a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playback {
    /// Media duration of the synthesized reply
    pub duration: Duration,
    /// Whether the player was started
    pub started: bool,
}

/// Media duration of an MP3 file; zero when the file is missing or cannot
/// be decoded
#[inline]
pub fn audio_duration(path: &Path) -> Duration {
    if !path.exists() {
        debug!("No synthesized audio at {}", path.display());
        return Duration::ZERO;
    }

    mp3_duration::from_path(path).unwrap_or_else(|e| {
        warn!("Could not read duration of {}: {}", path.display(), e);
        Duration::ZERO
    })
}

pub struct VoiceTurnHandler {
    speech_to_text: Arc<dyn SpeechToText>,
    text_to_speech: Arc<dyn TextToSpeech>,
    player: Arc<dyn AudioPlayer>,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl VoiceTurnHandler {
    #[inline]
    pub fn new(
        speech_to_text: Arc<dyn SpeechToText>,
        text_to_speech: Arc<dyn TextToSpeech>,
        player: Arc<dyn AudioPlayer>,
        scratch_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            speech_to_text,
            text_to_speech,
            player,
            scratch_dir,
            timeout,
        }
    }

    #[inline]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Scratch files for a new turn
    #[inline]
    pub fn scratch(&self) -> Result<ScratchFiles> {
        ScratchFiles::new(&self.scratch_dir)
    }

    /// Write the finalized recording to its scratch file and transcribe it
    #[inline]
    pub async fn transcribe(
        &self,
        scratch: &ScratchFiles,
        recording: &[u8],
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::fs::write(scratch.recording(), recording)
            .await
            .map_err(|e| BotError::Transcription(format!("Failed to store recording: {e}")))?;

        let transcript = with_deadline(
            "transcription",
            self.timeout,
            cancel,
            self.speech_to_text.transcribe(scratch.recording()),
        )
        .await
        .map_err(|e| e.in_stage(BotError::Transcription))?;

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(BotError::Transcription(
                "no speech was recognized".to_string(),
            ));
        }

        info!("Transcribed {} characters", transcript.len());
        Ok(transcript)
    }

    /// Synthesize `reply`, start playback and wait for the audio's duration
    #[inline]
    pub async fn speak(
        &self,
        scratch: &ScratchFiles,
        reply: &str,
        cancel: &CancellationToken,
    ) -> Result<Playback> {
        with_deadline(
            "speech synthesis",
            self.timeout,
            cancel,
            self.text_to_speech.synthesize(reply, scratch.reply()),
        )
        .await
        .map_err(|e| e.in_stage(BotError::Synthesis))?;

        let duration = audio_duration(scratch.reply());
        let started = if scratch.reply().exists() {
            self.player
                .play(scratch.reply())
                .await
                .map_err(|e| e.in_stage(BotError::Synthesis))?;
            true
        } else {
            false
        };

        debug!("Waiting {:?} for playback", duration);
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(BotError::Cancelled("playback".to_string()));
            }
            () = tokio::time::sleep(duration) => {}
        }

        Ok(Playback { duration, started })
    }
}
