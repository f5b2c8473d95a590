//! The sync orchestrator: the walk-classify-copy-record loop.
//!
//! For each discovered file and each configured category (in configuration
//! order) the orchestrator consults the ledger, tests the category rule,
//! copies the file into the category's destination tree, and records the
//! pair. Originals are never modified or deleted.
//!
//! Every per-pair failure is isolated: it is reported through the returned
//! outcome and the loop moves on. A failed pair is never recorded, so it is
//! naturally retried on the next run.

use crate::category::CategoryRule;
use crate::ledger::{Ledger, LedgerEntry, LedgerError};
use crate::path_mapper::{PathMapper, PathMismatchError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-pair failures. None of these abort the run.
#[derive(Debug)]
pub enum SyncError {
    /// The discovered path is not under its declared source root.
    PathMismatch(PathMismatchError),
    /// Could not create the destination's parent directory hierarchy.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The byte-for-byte copy failed.
    CopyFailed {
        source_path: PathBuf,
        destination_path: PathBuf,
        source: std::io::Error,
    },
    /// The copy succeeded but the ledger append did not. The pair stays
    /// unrecorded and is recopied next run.
    LedgerWriteFailed(LedgerError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::PathMismatch(err) => write!(f, "{}", err),
            SyncError::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            SyncError::CopyFailed {
                source_path,
                destination_path,
                source,
            } => {
                write!(
                    f,
                    "Failed to copy {} to {}: {}",
                    source_path.display(),
                    destination_path.display(),
                    source
                )
            }
            SyncError::LedgerWriteFailed(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SyncError {}

/// What happened to one (file, category) pair.
#[derive(Debug)]
pub enum PairOutcome {
    /// Copied and recorded.
    Copied(LedgerEntry),
    /// Dry run: the pair would be copied.
    WouldCopy {
        category_name: String,
        destination_path: PathBuf,
    },
    /// The ledger already holds this pair; nothing was done.
    AlreadyProcessed { category_name: String },
    /// The pair failed and was not recorded.
    Failed {
        category_name: String,
        source_path: PathBuf,
        error: SyncError,
    },
}

/// Aggregated counts over a run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Pairs copied and recorded.
    pub copied: usize,
    /// Pairs that would be copied (dry run).
    pub would_copy: usize,
    /// Pairs skipped because the ledger already held them.
    pub already_processed: usize,
    /// Pairs that failed.
    pub failed: usize,
    /// Successful copies per category name.
    pub copied_by_category: HashMap<String, usize>,
}

impl SyncReport {
    /// Folds one outcome into the counts.
    pub fn absorb(&mut self, outcome: &PairOutcome) {
        match outcome {
            PairOutcome::Copied(entry) => {
                self.copied += 1;
                *self
                    .copied_by_category
                    .entry(entry.category_name.clone())
                    .or_insert(0) += 1;
            }
            PairOutcome::WouldCopy { category_name, .. } => {
                self.would_copy += 1;
                *self
                    .copied_by_category
                    .entry(category_name.clone())
                    .or_insert(0) += 1;
            }
            PairOutcome::AlreadyProcessed { .. } => self.already_processed += 1,
            PairOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Merges another report into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.copied += other.copied;
        self.would_copy += other.would_copy;
        self.already_processed += other.already_processed;
        self.failed += other.failed;
        for (category, count) in other.copied_by_category {
            *self.copied_by_category.entry(category).or_insert(0) += count;
        }
    }
}

/// Drives classification, dedupe, copy, and recording.
///
/// Single-threaded by design: one file and one category at a time.
pub struct SyncOrchestrator<'a> {
    categories: &'a [CategoryRule],
    ledger: &'a mut dyn Ledger,
    dry_run: bool,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(categories: &'a [CategoryRule], ledger: &'a mut dyn Ledger, dry_run: bool) -> Self {
        Self {
            categories,
            ledger,
            dry_run,
        }
    }

    /// Processes one candidate file against every category, in
    /// configuration order.
    ///
    /// Per pair: skip if already recorded, skip if the rule rejects it,
    /// otherwise map the destination, copy, and record. A file matching
    /// several categories is copied and recorded independently for each.
    pub fn process_file(&mut self, source_root: &Path, file_path: &Path) -> Vec<PairOutcome> {
        let mut outcomes = Vec::new();

        for category in self.categories {
            if self.ledger.contains(file_path, category.name()) {
                outcomes.push(PairOutcome::AlreadyProcessed {
                    category_name: category.name().to_string(),
                });
                continue;
            }

            if !category.belongs(file_path) {
                continue;
            }

            let mapper = PathMapper::new(source_root, category.destination_root());
            let destination_path = match mapper.map(file_path) {
                Ok(destination) => destination,
                Err(err) => {
                    outcomes.push(PairOutcome::Failed {
                        category_name: category.name().to_string(),
                        source_path: file_path.to_path_buf(),
                        error: SyncError::PathMismatch(err),
                    });
                    continue;
                }
            };

            if self.dry_run {
                outcomes.push(PairOutcome::WouldCopy {
                    category_name: category.name().to_string(),
                    destination_path,
                });
                continue;
            }

            if let Err(error) = copy_file(file_path, &destination_path) {
                outcomes.push(PairOutcome::Failed {
                    category_name: category.name().to_string(),
                    source_path: file_path.to_path_buf(),
                    error,
                });
                continue;
            }

            let entry = LedgerEntry::new(file_path, category.name(), &destination_path);
            match self.ledger.record(entry.clone()) {
                Ok(()) => outcomes.push(PairOutcome::Copied(entry)),
                Err(err) => outcomes.push(PairOutcome::Failed {
                    category_name: category.name().to_string(),
                    source_path: file_path.to_path_buf(),
                    error: SyncError::LedgerWriteFailed(err),
                }),
            }
        }

        outcomes
    }

    /// Processes every file of one source root and aggregates the counts.
    pub fn sync_root<I>(&mut self, source_root: &Path, files: I) -> SyncReport
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut report = SyncReport::default();
        for file_path in files {
            for outcome in self.process_file(source_root, &file_path) {
                report.absorb(&outcome);
            }
        }
        report
    }
}

/// Ensures the destination's parent hierarchy exists and copies the file
/// byte-for-byte, overwriting any pre-existing destination file. The ledger
/// is the sole source of truth for "already handled", so an unrecorded
/// destination file is assumed stale (e.g. left by a crashed run).
fn copy_file(source_path: &Path, destination_path: &Path) -> Result<(), SyncError> {
    if let Some(parent) = destination_path.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::copy(source_path, destination_path).map_err(|e| SyncError::CopyFailed {
        source_path: source_path.to_path_buf(),
        destination_path: destination_path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FileLedger;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn category(name: &str, extensions: &[&str], dst: &Path, exclude: Option<&str>) -> CategoryRule {
        let extensions: Vec<String> = extensions.iter().map(|s| s.to_string()).collect();
        CategoryRule::new(name, &extensions, dst, exclude).expect("rule construction failed")
    }

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        fs::write(path, content).expect("Failed to write file");
    }

    /// In-memory ledger whose writes always fail; membership still works.
    struct FailingLedger {
        seen: HashSet<(PathBuf, String)>,
    }

    impl FailingLedger {
        fn new() -> Self {
            Self {
                seen: HashSet::new(),
            }
        }
    }

    impl Ledger for FailingLedger {
        fn contains(&self, source_path: &Path, category_name: &str) -> bool {
            self.seen
                .contains(&(source_path.to_path_buf(), category_name.to_string()))
        }

        fn record(&mut self, _entry: LedgerEntry) -> Result<(), LedgerError> {
            Err(LedgerError::WriteFailed {
                source: std::io::Error::other("disk full"),
            })
        }
    }

    #[test]
    fn test_end_to_end_copy_and_record() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst").join("movies");
        let source = src_root.join("a").join("movie.mkv");
        write_file(&source, "movie bytes");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];
        let mut ledger =
            FileLedger::open(&temp_dir.path().join("ledger.jsonl")).expect("Failed to open ledger");

        let report = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![source.clone()]);

        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 0);

        let copied = dst_root.join("a").join("movie.mkv");
        assert!(copied.exists());
        assert_eq!(fs::read_to_string(&copied).unwrap(), "movie bytes");
        // Original untouched.
        assert!(source.exists());
        assert!(ledger.contains(&source, "movies"));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst");
        let source = src_root.join("movie.mkv");
        write_file(&source, "bytes");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];
        let ledger_path = temp_dir.path().join("ledger.jsonl");

        let mut ledger = FileLedger::open(&ledger_path).expect("open");
        let first = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![source.clone()]);
        assert_eq!(first.copied, 1);

        // Fresh ledger handle, as a new run would have.
        let mut ledger = FileLedger::open(&ledger_path).expect("reopen");
        let second = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![source.clone()]);

        assert_eq!(second.copied, 0);
        assert_eq!(second.already_processed, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_multi_category_fan_out() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let videos = temp_dir.path().join("videos");
        let clips = temp_dir.path().join("clips");
        let episode = src_root.join("episode.mp4");
        let sample = src_root.join("sample.mp4");
        write_file(&episode, "episode");
        write_file(&sample, "sample");

        let categories = vec![
            category("videos", &["mp4"], &videos, None),
            category("clips", &["mp4"], &clips, Some(".*sample.*")),
        ];
        let mut ledger =
            FileLedger::open(&temp_dir.path().join("ledger.jsonl")).expect("Failed to open ledger");

        let report = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![episode.clone(), sample.clone()]);

        // episode matches both, sample only "videos".
        assert_eq!(report.copied, 3);
        assert!(videos.join("episode.mp4").exists());
        assert!(videos.join("sample.mp4").exists());
        assert!(clips.join("episode.mp4").exists());
        assert!(!clips.join("sample.mp4").exists());

        assert!(ledger.contains(&episode, "videos"));
        assert!(ledger.contains(&episode, "clips"));
        assert!(ledger.contains(&sample, "videos"));
        assert!(!ledger.contains(&sample, "clips"));
    }

    #[test]
    fn test_failed_ledger_write_leaves_pair_retryable() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst");
        let source = src_root.join("movie.mkv");
        write_file(&source, "bytes");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];

        // First run: copy succeeds but recording fails.
        let mut failing = FailingLedger::new();
        let report = SyncOrchestrator::new(&categories, &mut failing, false)
            .sync_root(&src_root, vec![source.clone()]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.copied, 0);
        assert!(dst_root.join("movie.mkv").exists());

        // Next run with a working ledger reprocesses the exact pair.
        let mut ledger =
            FileLedger::open(&temp_dir.path().join("ledger.jsonl")).expect("Failed to open ledger");
        let retry = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![source.clone()]);
        assert_eq!(retry.copied, 1);
        assert!(ledger.contains(&source, "movies"));
    }

    #[test]
    fn test_path_mismatch_is_per_pair_and_run_continues() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst");
        let inside = src_root.join("good.mkv");
        write_file(&inside, "good");
        let outside = temp_dir.path().join("elsewhere").join("stray.mkv");
        write_file(&outside, "stray");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];
        let mut ledger =
            FileLedger::open(&temp_dir.path().join("ledger.jsonl")).expect("Failed to open ledger");

        let report = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![outside.clone(), inside.clone()]);

        assert_eq!(report.failed, 1);
        assert_eq!(report.copied, 1);
        assert!(dst_root.join("good.mkv").exists());
        assert!(!ledger.contains(&outside, "movies"));
    }

    #[test]
    fn test_stale_destination_is_overwritten() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst");
        let source = src_root.join("movie.mkv");
        write_file(&source, "fresh bytes");

        // Leftover from a crashed run: destination exists, pair unrecorded.
        let stale = dst_root.join("movie.mkv");
        write_file(&stale, "partial");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];
        let mut ledger =
            FileLedger::open(&temp_dir.path().join("ledger.jsonl")).expect("Failed to open ledger");

        let report = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![source.clone()]);

        assert_eq!(report.copied, 1);
        assert_eq!(fs::read_to_string(&stale).unwrap(), "fresh bytes");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst");
        let source = src_root.join("movie.mkv");
        write_file(&source, "bytes");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];
        let ledger_path = temp_dir.path().join("ledger.jsonl");
        let mut ledger = FileLedger::open(&ledger_path).expect("Failed to open ledger");

        let report = SyncOrchestrator::new(&categories, &mut ledger, true)
            .sync_root(&src_root, vec![source.clone()]);

        assert_eq!(report.would_copy, 1);
        assert_eq!(report.copied, 0);
        assert!(!dst_root.exists());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_copy_failure_reported_and_not_recorded() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src_root = temp_dir.path().join("src");
        let dst_root = temp_dir.path().join("dst");
        // Source listed but never created on disk: the copy itself fails.
        let missing = src_root.join("ghost.mkv");

        let categories = vec![category("movies", &["mkv"], &dst_root, None)];
        let mut ledger =
            FileLedger::open(&temp_dir.path().join("ledger.jsonl")).expect("Failed to open ledger");

        let report = SyncOrchestrator::new(&categories, &mut ledger, false)
            .sync_root(&src_root, vec![missing.clone()]);

        assert_eq!(report.failed, 1);
        assert!(ledger.is_empty());
    }
}
