use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::AudioPlayer;
use crate::{BotError, Result};

/// Plays audio through an external command; the file path is appended to
/// its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    /// `None` when the command line is empty
    #[inline]
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        debug!("Playing {} with {}", path.display(), self.program);

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                BotError::Synthesis(format!("Failed to start player {}: {e}", self.program))
            })?;

        // Reap the player in the background
        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => warn!("{} exited with {}", program, status),
                Ok(_) => {}
                Err(e) => warn!("Failed to wait for {}: {}", program, e),
            }
        });

        Ok(())
    }
}

/// Player for sessions without audio output
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        debug!("No player configured, not playing {}", path.display());
        Ok(())
    }
}
