mod cli;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use picsearch::config::PicsearchConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "picsearch", version, about = "Upload images and find them by description")]
struct Cli {
    /// Config file (defaults to ~/.picsearch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web server
    Serve {
        /// Address to listen on, overrides `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Run a text search from the command line
    Search {
        /// What to look for, e.g. "a dog on a beach"
        query: String,
    },
    /// Check configuration, model files, bucket and collection
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the CLIP model to ~/.picsearch/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PicsearchConfig::load_from(path)?,
        None => PicsearchConfig::load()?,
    };

    // Log to stderr so `search` output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            server::serve(config).await?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Search { query } => {
            cli::search::search(config, &query).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(config).await?;
        }
    }

    Ok(())
}
