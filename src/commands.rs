use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Config, prompt_api_key};
use crate::database::{Collection, VectorStore};
use crate::documents::FileLoader;
use crate::embeddings::TextSplitter;
use crate::generation::ResponseGenerator;
use crate::ingest::Ingester;
use crate::openai::OpenAiClient;
use crate::retrieval::Retriever;
use crate::session::{ChatSession, TurnReply};
use crate::voice::{AudioPlayer, CommandPlayer, SilentPlayer, VoiceTurnHandler};

const ASK_SOMETHING_ELSE: &str = "Ask something else...";

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatInput {
    Quit,
    Voice(PathBuf),
    Text(String),
    Empty,
}

fn parse_chat_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        ChatInput::Empty
    } else if line == "/quit" || line == "/exit" {
        ChatInput::Quit
    } else if let Some(path) = line.strip_prefix("/voice") {
        let path = path.trim();
        if path.is_empty() {
            ChatInput::Empty
        } else {
            ChatInput::Voice(PathBuf::from(path))
        }
    } else {
        ChatInput::Text(line.to_string())
    }
}

/// Ask for the API key and verify it before any pipeline call
async fn connect_client(config: &Config) -> Result<OpenAiClient> {
    let api_key = tokio::task::spawn_blocking(prompt_api_key)
        .await
        .context("API key prompt failed")??;

    if api_key.is_empty() {
        bail!("No API key provided. Please enter your OpenAI API key.");
    }

    let client = OpenAiClient::connect(&config.openai, api_key)
        .await
        .context("Could not connect to the OpenAI API")?;
    eprintln!("{}", style("✓ API key accepted").green());
    Ok(client)
}

async fn open_collection(config: &Config) -> Result<VectorStore> {
    VectorStore::get_or_create(
        &config.knowledge_base_path(),
        &config.knowledge_base.collection,
    )
    .await
    .context("Failed to open the knowledge base")
}

/// Cancel `token` on Ctrl-C until the returned task is aborted
fn cancel_on_ctrl_c(token: &CancellationToken) -> JoinHandle<()> {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}

/// Where Ctrl-C goes during a chat session: the running turn when there is
/// one, otherwise the session itself
#[derive(Debug, Clone)]
struct InterruptTarget {
    session: CancellationToken,
    turn: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptTarget {
    fn new(session: CancellationToken) -> Self {
        Self {
            session,
            turn: Arc::new(Mutex::new(None)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_turn(&self, turn: &CancellationToken) {
        *self.slot() = Some(turn.clone());
    }

    fn clear_turn(&self) {
        self.slot().take();
    }

    /// Cancel the running turn, or end the session when idle. Returns whether
    /// the session is still going.
    fn interrupt(&self) -> bool {
        let turn = self.slot().take();
        if let Some(turn) = turn {
            debug!("Interrupt cancels the running turn");
            turn.cancel();
            true
        } else {
            debug!("Interrupt ends the session");
            self.session.cancel();
            false
        }
    }

    /// Route every Ctrl-C for the lifetime of the session
    fn watch_ctrl_c(&self) -> JoinHandle<()> {
        let target = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !target.interrupt() {
                    break;
                }
            }
        })
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}

/// Load the configured documents into the knowledge base
#[inline]
pub async fn run_ingest(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let documents = config.document_paths();
    if documents.is_empty() {
        bail!("No documents configured. Run `karrybot config` to add some.");
    }

    let client = Arc::new(connect_client(&config).await?);
    let store = Arc::new(open_collection(&config).await?);
    let splitter =
        TextSplitter::new(config.chunking).context("Invalid chunking configuration")?;

    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(&cancel);

    let ingester = Ingester::new(
        Arc::new(FileLoader),
        client,
        Arc::clone(&store) as Arc<dyn Collection>,
        splitter,
        config.openai.batch_size as usize,
        config.openai.request_timeout(),
    )
    .with_cancellation(cancel)
    .with_progress(true);

    let result = ingester.ingest(&documents).await;
    watcher.abort();
    let report = result.context("Ingestion failed")?;

    println!();
    println!("{}", style("📚 Ingestion Report").bold().cyan());
    println!(
        "  Documents loaded: {}",
        style(report.documents_loaded).green()
    );
    println!("  Chunks stored: {}", style(report.chunks_stored).green());
    if !report.documents_failed.is_empty() {
        println!(
            "  Documents failed: {}",
            style(report.documents_failed.len()).red()
        );
        for (path, reason) in &report.documents_failed {
            println!("    {} {}: {}", style("✗").red(), path.display(), reason);
        }
    }
    println!(
        "  Collection {} now holds {} chunks",
        style(store.name()).cyan(),
        store.count().await?
    );

    Ok(())
}

/// Interactive chat session
#[inline]
pub async fn run_chat(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    println!(
        "{}",
        style(format!("🤖 KarryBot - {}'s Personal Assistant", config.assistant.subject))
            .bold()
            .cyan()
    );

    let client = Arc::new(connect_client(&config).await?);
    let store = Arc::new(open_collection(&config).await?);

    if store.count().await? == 0 {
        eprintln!(
            "{}",
            style("⚠ The knowledge base is empty. Run `karrybot ingest` first for useful answers.")
                .yellow()
        );
    }

    let timeout = config.openai.request_timeout();
    let retriever = Retriever::new(
        Arc::clone(&client) as _,
        store,
        config.knowledge_base.top_k,
        timeout,
    );
    let generator =
        ResponseGenerator::new(retriever, Arc::clone(&client) as _, &config.assistant, timeout);

    let player: Arc<dyn AudioPlayer> = match CommandPlayer::from_command(&config.audio.player) {
        Some(player) => Arc::new(player),
        None => Arc::new(SilentPlayer),
    };
    let voice = VoiceTurnHandler::new(
        Arc::clone(&client) as _,
        client,
        player,
        config.scratch_dir_path(),
        timeout,
    );

    let cancel = CancellationToken::new();
    let mut session = ChatSession::new(generator, Some(voice), cancel.clone());
    let interrupts = InterruptTarget::new(cancel.clone());
    let watcher = interrupts.watch_ctrl_c();

    println!(
        "Type a question, {} to send a recording, or {} to leave. Ctrl-C cancels a running turn and leaves otherwise.",
        style("/voice <file.mp3>").cyan(),
        style("/quit").cyan()
    );

    loop {
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Session interrupted");
                break;
            }
            line = next_input(&session) => match line {
                Ok(line) => line,
                Err(e) => {
                    info!("Input closed: {}", e);
                    break;
                }
            },
        };

        match parse_chat_input(&line) {
            ChatInput::Quit => break,
            ChatInput::Empty => {}
            ChatInput::Text(query) => {
                print_user(&query);
                let turn = session.begin_turn();
                interrupts.set_turn(&turn);
                let bar = spinner("Thinking...");
                let reply = session.submit_text(&query, &turn).await;
                bar.finish_and_clear();
                interrupts.clear_turn();
                print_reply(&reply);
            }
            ChatInput::Voice(path) => {
                let recording = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        eprintln!(
                            "{} Could not read {}: {}",
                            style("✗").red(),
                            path.display(),
                            e
                        );
                        continue;
                    }
                };

                let turn = session.begin_turn();
                interrupts.set_turn(&turn);
                let bar = spinner("Speaking...");
                let report = session.submit_voice(&recording, &turn).await;
                bar.finish_and_clear();
                interrupts.clear_turn();

                if let Some(transcript) = &report.transcript {
                    print_user(transcript);
                }
                print_reply(&report.reply);
                if let Some(speech_error) = &report.speech_error {
                    eprintln!("{} {}", style("⚠").yellow(), speech_error);
                }
            }
        }
    }

    session.end();
    watcher.abort();
    println!("{}", style("Goodbye!").cyan());
    Ok(())
}

/// Offer the sample prompts while the session is fresh, otherwise read a
/// line
async fn next_input(session: &ChatSession) -> Result<String> {
    let samples = session.state().sample_prompts();
    tokio::task::spawn_blocking(move || -> Result<String> {
        if let Some(samples) = samples {
            let mut items: Vec<&str> = samples.to_vec();
            items.push(ASK_SOMETHING_ELSE);
            let choice = Select::new()
                .with_prompt("Try one of these")
                .items(&items)
                .default(0)
                .interact()?;
            if let Some(sample) = samples.get(choice) {
                return Ok((*sample).to_string());
            }
        }

        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        Ok(line)
    })
    .await
    .context("Input prompt failed")?
}

fn print_user(text: &str) {
    println!("{} {}", style("👤").bold(), text);
}

fn print_reply(reply: &TurnReply) {
    if reply.failed {
        println!("{} {}", style("🤖").bold(), style(&reply.text).red());
    } else {
        println!("{} {}", style("🤖").bold(), reply.text);
    }
}

/// Show the knowledge base summary
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).unwrap_or_else(|e| {
        warn!("Using default configuration: {}", e);
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    });

    println!("📊 KarryBot Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Knowledge Base:");
    match open_collection(&config).await {
        Ok(store) => {
            println!("   ✅ Collection: {}", store.name());
            println!("   📁 Location: {}", store.path().display());
            match store.count().await {
                Ok(count) => println!("   🧩 Stored chunks: {}", count),
                Err(e) => println!("   ❌ Could not count chunks - {}", e),
            }
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {:#}", e);
        }
    }

    println!();
    println!("📄 Documents:");
    for path in config.document_paths() {
        if path.exists() {
            println!("   ✅ {}", path.display());
        } else {
            println!("   ❌ {} (missing)", path.display());
        }
    }

    println!();
    println!("🤖 Models:");
    println!("   Chat: {}", config.openai.chat_model);
    println!("   Embeddings: {}", config.openai.embedding_model);
    println!(
        "   Voice: {} / {} ({})",
        config.openai.transcription_model, config.openai.speech_model, config.openai.voice
    );

    Ok(())
}

/// Delete every stored chunk after confirmation
#[inline]
pub async fn reset_knowledge_base(config_dir: &Path, assume_yes: bool) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let store = open_collection(&config).await?;
    let count = store.count().await?;

    println!(
        "Collection {} at {} holds {} chunks.",
        style(store.name()).cyan(),
        store.path().display(),
        count
    );

    let confirmed = assume_yes
        || tokio::task::spawn_blocking(|| {
            Confirm::new()
                .with_prompt("Delete all stored chunks? This cannot be undone.")
                .default(false)
                .interact()
        })
        .await
        .context("Confirmation prompt failed")??;

    if !confirmed {
        println!("Reset cancelled.");
        return Ok(());
    }

    store.reset().await?;
    println!("{}", style("✓ Knowledge base cleared").green());
    Ok(())
}
