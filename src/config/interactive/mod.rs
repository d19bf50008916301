#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::{AssistantConfig, AudioConfig, Config, ConfigError, KnowledgeBaseConfig, OpenAiConfig};
use crate::embeddings::chunking::ChunkingConfig;
use crate::openai::ApiKey;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 KarryBot Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("OpenAI Configuration").bold().yellow());
    eprintln!("Models used for embeddings, chat, transcription and speech.");
    eprintln!("The API key is not stored; it is asked for when a session starts.");
    eprintln!();
    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Knowledge Base").bold().yellow());
    configure_knowledge_base(&mut config.knowledge_base)?;
    configure_chunking(&mut config.chunking)?;

    eprintln!();
    eprintln!("{}", style("Assistant Persona").bold().yellow());
    configure_assistant(&mut config.assistant)?;

    eprintln!();
    eprintln!("{}", style("Audio").bold().yellow());
    eprintln!("Spoken replies are played with an external command, e.g. `mpg123 -q`.");
    eprintln!("Leave the player empty for text-only replies.");
    configure_audio(&mut config.audio)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_api_reachable(&config.openai) {
        eprintln!("{}", style("✓ API endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the API endpoint").yellow()
        );
        eprintln!("You can continue, but chat and ingestion need network access.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("OpenAI Settings:").bold().yellow());
    match config.openai.api_url() {
        Ok(url) => eprintln!("  API URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  API URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    eprintln!(
        "  Transcription Model: {}",
        style(&config.openai.transcription_model).cyan()
    );
    eprintln!(
        "  Speech Model: {} (voice {})",
        style(&config.openai.speech_model).cyan(),
        style(&config.openai.voice).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.openai.batch_size).cyan());
    eprintln!(
        "  Request Timeout: {}s",
        style(config.openai.request_timeout_secs).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Knowledge Base:").bold().yellow());
    eprintln!(
        "  Location: {}",
        style(config.knowledge_base_path().display()).cyan()
    );
    eprintln!(
        "  Collection: {}",
        style(&config.knowledge_base.collection).cyan()
    );
    eprintln!("  Top K: {}", style(config.knowledge_base.top_k).cyan());
    eprintln!(
        "  Chunking: {} characters, {} overlap",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Documents:");
    for path in config.document_paths() {
        let marker = if path.exists() {
            style("✓").green()
        } else {
            style("✗").red()
        };
        eprintln!("    {} {}", marker, path.display());
    }

    eprintln!();
    eprintln!("{}", style("Assistant:").bold().yellow());
    eprintln!(
        "  {} answering about {}",
        style(&config.assistant.name).cyan(),
        style(&config.assistant.subject).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Audio:").bold().yellow());
    eprintln!(
        "  Scratch Directory: {}",
        style(config.scratch_dir_path().display()).cyan()
    );
    if config.audio.player.is_empty() {
        eprintln!("  Player: {}", style("none (text only)").dim());
    } else {
        eprintln!("  Player: {}", style(config.audio.player.join(" ")).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Ask for the API key without echoing it
#[inline]
pub fn prompt_api_key() -> Result<ApiKey> {
    let key = Password::new()
        .with_prompt("Enter your OpenAI API Key")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    Ok(ApiKey::new(key))
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            temp_config.api_url()?;
            Ok(())
        })
        .interact_text()?;

    let chat_model = prompt_non_empty("Chat model", &openai.chat_model)?;
    let embedding_model = prompt_non_empty("Embedding model", &openai.embedding_model)?;
    let transcription_model =
        prompt_non_empty("Transcription model", &openai.transcription_model)?;
    let speech_model = prompt_non_empty("Speech model", &openai.speech_model)?;
    let voice = prompt_non_empty("Speech voice", &openai.voice)?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(openai.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout: u64 = Input::new()
        .with_prompt("Request timeout in seconds")
        .default(openai.request_timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_chat_model(chat_model)?;
    openai.set_embedding_model(embedding_model)?;
    openai.set_transcription_model(transcription_model)?;
    openai.set_speech_model(speech_model)?;
    openai.set_voice(voice)?;
    openai.set_batch_size(batch_size)?;
    openai.set_request_timeout_secs(timeout)?;

    Ok(())
}

fn configure_knowledge_base(knowledge_base: &mut KnowledgeBaseConfig) -> Result<()> {
    let collection: String = Input::new()
        .with_prompt("Collection name")
        .default(knowledge_base.collection.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            KnowledgeBaseConfig::default().set_collection(input.clone())
        })
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(knowledge_base.top_k)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            KnowledgeBaseConfig::default().set_top_k(*input)
        })
        .interact_text()?;

    let current_documents = knowledge_base
        .documents
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let documents: String = Input::new()
        .with_prompt("Documents to ingest (comma separated)")
        .default(current_documents)
        .allow_empty(true)
        .interact_text()?;

    knowledge_base.set_collection(collection)?;
    knowledge_base.set_top_k(top_k)?;
    knowledge_base.documents = parse_document_list(&documents);

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig {
                chunk_size: *input,
                chunk_overlap: 0,
            }
            .validate()
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig {
                chunk_size,
                chunk_overlap: *input,
            }
            .validate()
        })
        .interact_text()?;

    *chunking = ChunkingConfig {
        chunk_size,
        chunk_overlap,
    };
    chunking.validate()?;

    Ok(())
}

fn configure_assistant(assistant: &mut AssistantConfig) -> Result<()> {
    assistant.name = prompt_non_empty("Assistant name", &assistant.name)?;
    assistant.subject = prompt_non_empty("Person the assistant answers about", &assistant.subject)?;
    Ok(())
}

fn configure_audio(audio: &mut AudioConfig) -> Result<()> {
    let current_dir = audio
        .scratch_dir
        .as_ref()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();
    let scratch_dir: String = Input::new()
        .with_prompt("Scratch directory for audio files (empty for default)")
        .default(current_dir)
        .allow_empty(true)
        .interact_text()?;

    let player: String = Input::new()
        .with_prompt("Audio player command (empty to disable playback)")
        .default(audio.player.join(" "))
        .allow_empty(true)
        .interact_text()?;

    audio.set_scratch_dir(parse_scratch_dir(&scratch_dir))?;
    audio.set_player(parse_player_command(&player))?;

    Ok(())
}

fn prompt_non_empty(prompt: &str, current: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Value cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(value.trim().to_string())
}

fn parse_document_list(input: &str) -> Vec<PathBuf> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_scratch_dir(input: &str) -> Option<PathBuf> {
    let input = input.trim();
    (!input.is_empty()).then(|| PathBuf::from(input))
}

/// Whitespace separated program and arguments; the audio file is appended
/// when playing
fn parse_player_command(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

fn test_api_reachable(openai: &OpenAiConfig) -> bool {
    let Ok(url) = openai.api_url().and_then(|base| {
        base.join("models")
            .map_err(|_| ConfigError::InvalidUrl(openai.base_url.clone()))
    }) else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    // Without a key the endpoint answers 401, which still proves it is there
    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
