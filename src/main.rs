use clap::Parser;
use mediasync::cli::{SyncOptions, run_cli_with_config};
use std::path::PathBuf;
use std::process::ExitCode;

/// Copy media files from source directories into category destinations,
/// at most once per (file, category) pair.
#[derive(Parser)]
#[command(name = "mediasync", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Folder to scan for media instead of the configured sources.
    #[arg(short, long, value_name = "PATH")]
    source: Option<PathBuf>,

    /// Report what would be copied without writing anything.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = SyncOptions {
        dry_run: cli.dry_run,
        source_override: cli.source,
    };

    if let Err(e) = run_cli_with_config(options, cli.config.as_deref()) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
