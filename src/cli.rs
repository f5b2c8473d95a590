//! Command-line glue.
//!
//! Loads and compiles the configuration, opens the ledger, enumerates
//! candidate files under each source root, feeds them through the
//! orchestrator, and prints the per-copy records and the run summary.

use crate::config::{SyncConfig, WalkFilters};
use crate::ledger::FileLedger;
use crate::output::OutputFormatter;
use crate::sync::{PairOutcome, SyncOrchestrator, SyncReport};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Options for one sync invocation.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Report would-copy pairs without writing files or ledger entries.
    pub dry_run: bool,
    /// Scan this single root instead of the configured sources.
    pub source_override: Option<PathBuf>,
}

/// Runs a sync using the default configuration lookup.
pub fn run_cli(options: SyncOptions) -> Result<(), String> {
    run_cli_with_config(options, None)
}

/// Runs a sync with an explicitly provided configuration file.
///
/// Only configuration problems and a ledger that cannot be opened are
/// fatal; every per-pair failure is reported and the run continues.
pub fn run_cli_with_config(
    options: SyncOptions,
    config_path: Option<&Path>,
) -> Result<(), String> {
    let config = SyncConfig::load(config_path)
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let compiled = config
        .compile()
        .map_err(|e| format!("Error compiling configuration: {}", e))?;

    if compiled.categories.is_empty() {
        OutputFormatter::plain("No categories defined; nothing to do.");
        return Ok(());
    }

    let source_roots = match &options.source_override {
        Some(root) => vec![root.clone()],
        None => compiled.source_roots.clone(),
    };

    let mut ledger = FileLedger::open(&compiled.ledger_path)
        .map_err(|e| format!("Error opening ledger: {}", e))?;

    if options.dry_run {
        OutputFormatter::dry_run_notice("No files or ledger entries will be written.");
    }

    let mut orchestrator =
        SyncOrchestrator::new(&compiled.categories, &mut ledger, options.dry_run);
    let mut report = SyncReport::default();

    for source_root in &source_roots {
        OutputFormatter::info(&format!("Scanning {}", source_root.display()));

        let files = enumerate_files(source_root, &compiled.filters);
        let pb = OutputFormatter::create_progress_bar(files.len() as u64);

        for file_path in files {
            for outcome in orchestrator.process_file(source_root, &file_path) {
                describe_outcome(&pb, &outcome);
                report.absorb(&outcome);
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
    }

    if options.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "{} pair(s) would be copied, {} already processed.",
            report.would_copy, report.already_processed
        ));
        return Ok(());
    }

    OutputFormatter::summary_table(&report.copied_by_category, report.copied);
    if report.already_processed > 0 {
        OutputFormatter::plain(&format!(
            "{} pair(s) skipped as already processed.",
            report.already_processed
        ));
    }
    if report.failed > 0 {
        OutputFormatter::warning(&format!(
            "{} pair(s) failed and will be retried next run. Review errors above.",
            report.failed
        ));
    }

    Ok(())
}

/// Walks one source root and returns the candidate files that survive the
/// global filters. Walk errors are reported, never silently dropped.
fn enumerate_files(source_root: &Path, filters: &WalkFilters) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(source_root) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.into_path();
                if filters.should_include(source_root, &path) {
                    files.push(path);
                }
            }
            Ok(_) => {}
            Err(e) => {
                OutputFormatter::error(&format!(
                    "Walk error under {}: {}",
                    source_root.display(),
                    e
                ));
            }
        }
    }

    files
}

/// Prints one line per noteworthy outcome through the progress bar, so bar
/// redraws don't garble the output.
fn describe_outcome(pb: &ProgressBar, outcome: &PairOutcome) {
    match outcome {
        PairOutcome::Copied(entry) => {
            pb.println(format!(
                "✓ {} -> {} [{}] at {}",
                entry.source_path.display(),
                entry.destination_path.display(),
                entry.category_name,
                entry.processed_at
            ));
        }
        PairOutcome::WouldCopy {
            category_name,
            destination_path,
        } => {
            pb.println(format!(
                "→ would copy to {} [{}]",
                destination_path.display(),
                category_name
            ));
        }
        PairOutcome::AlreadyProcessed { .. } => {}
        PairOutcome::Failed {
            category_name,
            source_path,
            error,
        } => {
            pb.println(format!(
                "✗ {} [{}]: {}",
                source_path.display(),
                category_name,
                error
            ));
        }
    }
}
