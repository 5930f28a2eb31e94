use bucket_evacuator::aws_client::ObjectStoreClient;
use bucket_evacuator::config::Config;
use bucket_evacuator::error::MigrationError;
use bucket_evacuator::orchestrator::{install_signal_handler, MigrationOrchestrator};
use bucket_evacuator::state::MigrationStateStore;
use bucket_evacuator::util::format_size;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bucket-evacuator", about = "Evacuate an S3-compatible bucket to local storage, then delete it")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Skip the per-bucket delete confirmation prompt.
    #[arg(long)]
    yes: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current phase and per-bucket progress, then exit.
    Status,
    /// Delete the state database so the next run starts from scratch.
    Reset,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Status) => run_status(&cli.config),
        Some(Commands::Reset) => run_reset(&cli.config, cli.yes),
        None => run_migration(cli.config, cli.yes).await,
    }
}

fn run_status(config: &Config) {
    let store = match MigrationStateStore::open(&config.state_db_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("could not open state database: {err}");
            std::process::exit(1);
        }
    };
    let phase = store.get_phase().unwrap_or(bucket_evacuator::state::Phase::Scanning);
    println!("phase: {phase}");
    match store.scan_summary() {
        Ok(summary) => println!(
            "{} bucket(s) scanned, {} file(s), {}",
            summary.bucket_count,
            summary.total_files,
            format_size(summary.total_size.max(0) as u64)
        ),
        Err(err) => eprintln!("could not read scan summary: {err}"),
    }
    if let Ok(buckets) = store.all_buckets() {
        for bucket in buckets {
            if let Ok(Some(info)) = store.bucket_info(&bucket) {
                println!(
                    "  {bucket}: scan={} sync={} verify={} delete={}",
                    info.scan_complete, info.sync_complete, info.verify_complete, info.delete_complete
                );
            }
        }
    }
}

fn run_reset(config: &Config, auto_confirm: bool) {
    if !auto_confirm {
        print!("This deletes {} and all migration progress. Continue? [y/N] ", config.state_db_path.display());
        use std::io::Write;
        std::io::stdout().flush().ok();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() || !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("aborted");
            return;
        }
    }
    match std::fs::remove_file(&config.state_db_path) {
        Ok(()) => println!("removed {}", config.state_db_path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => println!("nothing to reset"),
        Err(err) => {
            eprintln!("failed to remove state database: {err}");
            std::process::exit(1);
        }
    }
}

async fn run_migration(config: Config, auto_confirm: bool) {
    let store = match MigrationStateStore::open(&config.state_db_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("could not open state database: {err}");
            std::process::exit(1);
        }
    };
    let client = ObjectStoreClient::from_env().await;
    let cancel = CancellationToken::new();
    install_signal_handler(cancel.clone());

    let orchestrator = MigrationOrchestrator::new(client, store, config, auto_confirm);
    if let Err(err) = orchestrator.run(cancel).await {
        match &err {
            MigrationError::DriveUnavailable { path } => {
                eprintln!("DRIVE NOT AVAILABLE: {path:?} does not exist or is not mounted. Reconnect it and re-run to resume.");
            }
            MigrationError::PermissionDenied { path } => {
                eprintln!("PERMISSION DENIED: cannot write to {path:?}. Fix permissions and re-run to resume.");
            }
            other => {
                eprintln!("MIGRATION ERROR: {other}");
            }
        }
        std::process::exit(1);
    }
}
