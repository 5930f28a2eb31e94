use std::path::PathBuf;

use bucket_evacuator::compressible::{find_candidates, parse_size, print_compression_summary, report_and_compress_candidates};

use clap::Parser;

#[derive(Parser)]
#[command(name = "find-compressible", about = "Find large, not-already-compressed files tracked by a migration state database")]
struct Cli {
    /// Path to the migration state database written by bucket-evacuator.
    #[arg(long, default_value = "./migration_state.db")]
    db_path: PathBuf,

    /// Directory the evacuator downloaded objects into.
    #[arg(long, default_value = "./evacuated")]
    base_path: PathBuf,

    /// Minimum file size to consider, e.g. "512M", "2G".
    #[arg(long, default_value = "512M")]
    min_size: String,

    /// Restrict the search to these buckets. May be repeated.
    #[arg(long)]
    bucket: Vec<String>,

    /// Stop after this many candidates.
    #[arg(long)]
    limit: Option<usize>,

    /// Actually run `xz` on each candidate instead of just listing them.
    #[arg(long)]
    compress: bool,

    /// Delete the state database instead of scanning for candidates.
    #[arg(long)]
    reset_state_db: bool,

    /// Skip the confirmation prompt for --reset-state-db.
    #[arg(long)]
    yes: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.reset_state_db {
        reset_state_db(&cli.db_path, cli.yes);
        return;
    }

    let min_size = match parse_size(&cli.min_size) {
        Some(size) => size,
        None => {
            eprintln!("invalid --min-size value: {}", cli.min_size);
            std::process::exit(2);
        }
    };

    let candidates = match find_candidates(&cli.db_path, min_size, &cli.bucket, cli.limit) {
        Ok(candidates) => candidates,
        Err(err) => {
            eprintln!("failed to query state database: {err}");
            std::process::exit(1);
        }
    };

    let summary = report_and_compress_candidates(&cli.base_path, &candidates, cli.compress);
    if cli.compress {
        print_compression_summary(&summary);
        if summary.failed > 0 {
            std::process::exit(1);
        }
    }
}

fn reset_state_db(db_path: &PathBuf, auto_confirm: bool) {
    if !auto_confirm {
        use std::io::Write;
        print!("This deletes {} permanently. Continue? [y/N] ", db_path.display());
        std::io::stdout().flush().ok();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() || !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("aborted");
            return;
        }
    }
    match std::fs::remove_file(db_path) {
        Ok(()) => println!("removed {}", db_path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => println!("nothing to reset"),
        Err(err) => {
            eprintln!("failed to remove state database: {err}");
            std::process::exit(1);
        }
    }
}
