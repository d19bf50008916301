use clap::{Parser, Subcommand};
use karrybot::Result;
use karrybot::commands::{reset_knowledge_base, run_chat, run_ingest, show_status};
use karrybot::config::{get_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "karrybot")]
#[command(about = "A personal assistant that answers questions from your own documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure models, documents and the assistant persona
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load the configured documents into the knowledge base
    Ingest,
    /// Start an interactive chat session
    Chat,
    /// Show the state of the knowledge base
    Status,
    /// Delete every chunk stored in the knowledge base
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir().map_err(anyhow::Error::from)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest => {
            run_ingest(&config_dir).await?;
        }
        Commands::Chat => {
            run_chat(&config_dir).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
        Commands::Reset { yes } => {
            reset_knowledge_base(&config_dir, yes).await?;
        }
    }

    Ok(())
}
