use anyhow::{Context, Result};
use chrono::TimeZone;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use caption_api::api::config::ApiConfig;
use caption_api::api::start_server;
use caption_api::client::{CaptionClient, GenerateOutcome, HttpTransport, SelectedFile};
use caption_api::history::{FileBackend, HistoryStore};
use caption_api::utils::logger::init_logger;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_HISTORY_DIR: &str = "history";

#[derive(Debug, Parser)]
#[command(name = "caption_api", version, about = "Image captioning service and client")]
struct Cli {
    /// Configuration file (TOML, JSON, YAML, ...)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the caption API server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Caption an image file through a running server
    Caption {
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,
        #[arg(long, default_value = DEFAULT_HISTORY_DIR)]
        history_dir: PathBuf,
    },
    /// Inspect or edit the local caption history
    History {
        #[arg(long, default_value = DEFAULT_HISTORY_DIR)]
        history_dir: PathBuf,
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List,
    Delete { id: String },
    Clear,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ApiConfig::load(cli.config.as_deref())?;
    let _ = init_logger(&config.log_dir);

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            start_server(config).await
        },
        Command::Caption { file, server, history_dir } => caption_file(&file, &server, history_dir).await,
        Command::History { history_dir, action } => run_history(history_dir, action),
    }
}

fn open_history(dir: PathBuf) -> Arc<HistoryStore> {
    let backend = FileBackend::new(dir);
    debug!("History slot: {}", backend.path().display());
    Arc::new(HistoryStore::new(backend))
}

async fn caption_file(path: &Path, server: &str, history_dir: PathBuf) -> Result<()> {
    let transport = HttpTransport::new(server)?;
    let history = open_history(history_dir);
    let subscription = history.subscribe(|| info!("History updated"));

    let client = CaptionClient::new(Arc::new(transport), history.clone());
    let file = SelectedFile::from_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    // Rejected before anything is sent
    client.select_file(file)?;

    let outcome = client.generate().await;
    history.unsubscribe(subscription);
    match outcome {
        GenerateOutcome::Captioned(caption) => {
            println!("{}", caption);
            Ok(())
        },
        GenerateOutcome::Failed(error) => anyhow::bail!("Error generating caption: {}", error),
        GenerateOutcome::Skipped => Ok(()),
    }
}

fn run_history(history_dir: PathBuf, action: HistoryAction) -> Result<()> {
    let history = open_history(history_dir);
    match action {
        HistoryAction::List => {
            let records = history.list();
            if records.is_empty() {
                println!("No history yet.");
            }
            for record in records {
                let when = chrono::Local
                    .timestamp_millis_opt(record.timestamp)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| record.timestamp.to_string());
                println!("{}  {}  {}", record.id, when, record.caption);
            }
        },
        HistoryAction::Delete { id } => history.delete_by_id(&id).context("Failed to update history")?,
        HistoryAction::Clear => history.clear().context("Failed to clear history")?,
    }
    Ok(())
}
