use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deck_client::{
    format_size, HttpImportGateway, ImportGateway, PackageFile, Transition,
    UploadWorkflowController, WorkflowError, WorkflowState,
};
use shared::protocol::DeckSummary;
use tracing::{debug, warn};

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(version, about = "Import Anki deck packages and browse the deck library")]
struct Args {
    /// Base URL of the import backend; overrides deckctl.toml and the environment.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a deck package. Only the first file is imported.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List imported decks.
    Decks,
    /// Check whether the backend is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();
    debug!(?settings, "loaded settings");

    let http_gateway =
        HttpImportGateway::with_chunk_size(settings.api_base_url.clone(), settings.upload_chunk_bytes);
    debug!(base_url = http_gateway.base_url(), "using import backend");
    let gateway: Arc<dyn ImportGateway> = Arc::new(http_gateway);

    match args.command {
        Command::Import { files } => run_import(gateway, files).await,
        Command::Decks => run_decks(gateway).await,
        Command::Health => run_health(gateway.as_ref()).await,
    }
}

async fn run_import(gateway: Arc<dyn ImportGateway>, paths: Vec<PathBuf>) -> Result<ExitCode> {
    let Some(path) = paths.first() else {
        return Ok(ExitCode::FAILURE);
    };
    if paths.len() > 1 {
        warn!(ignored = paths.len() - 1, "only the first file is imported");
    }
    let file = PackageFile::from_path(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    if !gateway.check_health().await {
        warn!("backend health check failed; attempting import anyway");
    }

    let mut controller = UploadWorkflowController::new(gateway);
    controller.initialize().await;

    match start_import(&mut controller, file) {
        Ok(banner) => println!("{banner}"),
        Err(err) => {
            debug!("upload did not start: {err}");
            print_messages(controller.state());
            return Ok(ExitCode::FAILURE);
        }
    }

    let mut outcome = None;
    while let Some(transition) = controller.next_transition().await {
        match transition {
            Transition::Progress(percent) => println!("  {percent:>3}%"),
            Transition::Ignored => {}
            terminal => outcome = Some(terminal),
        }
    }

    print_messages(controller.state());
    if outcome == Some(Transition::Succeeded) {
        print_decks(&controller.state().decks);
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Starts the upload and returns the line announcing it. Nothing is announced
/// for a file the controller refuses.
fn start_import(
    controller: &mut UploadWorkflowController,
    file: PackageFile,
) -> Result<String, WorkflowError> {
    let banner = format!("Uploading {} ({})", file.name(), format_size(file.size()));
    controller.handle_file_selection(vec![file])?;
    Ok(banner)
}

async fn run_decks(gateway: Arc<dyn ImportGateway>) -> Result<ExitCode> {
    let mut controller = UploadWorkflowController::new(gateway);
    controller.initialize().await;
    if controller.state().error_message.is_some() {
        print_messages(controller.state());
        return Ok(ExitCode::FAILURE);
    }
    print_decks(&controller.state().decks);
    Ok(ExitCode::SUCCESS)
}

async fn run_health(gateway: &dyn ImportGateway) -> Result<ExitCode> {
    if gateway.check_health().await {
        println!("healthy");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("unhealthy");
        Ok(ExitCode::FAILURE)
    }
}

fn print_messages(state: &WorkflowState) {
    if let Some(message) = &state.success_message {
        println!("{message}");
    }
    if let Some(message) = &state.error_message {
        eprintln!("{message}");
    }
}

fn print_decks(decks: &[DeckSummary]) {
    if decks.is_empty() {
        println!("No decks imported yet.");
        return;
    }
    for deck in decks {
        println!(
            "{:<32} {:>6} cards {:>4} lessons  created {}",
            deck.name,
            deck.card_count,
            deck.lesson_count,
            deck.created_at.format("%Y-%m-%d")
        );
        if let Some(description) = &deck.description {
            println!("    {description}");
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
