//! The processing ledger: a durable, append-only record of
//! (source path, category) pairs already copied.
//!
//! The ledger is the system's only durable state. Recording happens after a
//! successful copy, so a crash between copy and record leaves the pair
//! unrecorded and it is simply recopied on the next run (at-least-once copy,
//! not exactly-once). Entries are never mutated or removed.
//!
//! The file backend is a JSON-lines append log with an in-memory index: one
//! serialized `LedgerEntry` per line, loaded into a hash set on open so that
//! membership checks are point queries.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One processed (source file, category) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Absolute path of the original file at the time of processing.
    pub source_path: PathBuf,
    /// The category this entry was processed for.
    pub category_name: String,
    /// Where the copy was written.
    pub destination_path: PathBuf,
    /// ISO 8601 timestamp, informational only.
    pub processed_at: String,
}

impl LedgerEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(source_path: &Path, category_name: &str, destination_path: &Path) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            category_name: category_name.to_string(),
            destination_path: destination_path.to_path_buf(),
            processed_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Errors raised by ledger persistence.
#[derive(Debug)]
pub enum LedgerError {
    /// The ledger store could not be opened or created. Fatal for the run:
    /// without the ledger no dedupe is possible.
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// An existing ledger line failed to parse.
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    /// Appending an entry failed. Per-pair, non-fatal: the orchestrator
    /// reports it and continues.
    WriteFailed { source: std::io::Error },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::OpenFailed { path, source } => {
                write!(f, "Failed to open ledger {}: {}", path.display(), source)
            }
            LedgerError::Corrupt { path, line, reason } => {
                write!(
                    f,
                    "Corrupt ledger {} at line {}: {}",
                    path.display(),
                    line,
                    reason
                )
            }
            LedgerError::WriteFailed { source } => {
                write!(f, "Failed to append ledger entry: {}", source)
            }
        }
    }
}

impl std::error::Error for LedgerError {}

/// Membership and append operations over processed pairs.
///
/// Keeping this a trait lets the storage backend vary (flat append log,
/// embedded key-value store, relational table) without touching the
/// orchestrator.
pub trait Ledger {
    /// True iff `record` succeeded for this pair in this or any prior run.
    fn contains(&self, source_path: &Path, category_name: &str) -> bool;

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::WriteFailed` when the underlying store cannot
    /// be written.
    fn record(&mut self, entry: LedgerEntry) -> Result<(), LedgerError>;
}

/// JSON-lines file-backed ledger.
pub struct FileLedger {
    writer: File,
    index: HashSet<(PathBuf, String)>,
}

impl FileLedger {
    /// Opens the ledger at `path`, creating the file and its parent
    /// directories on first use. Re-opening an existing store is a no-op
    /// beyond loading the index.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::OpenFailed` when the file cannot be created or
    /// read, and `LedgerError::Corrupt` when an existing line fails to
    /// parse.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| LedgerError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let mut index = HashSet::new();
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| LedgerError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

            for (number, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: LedgerEntry =
                    serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
                        path: path.to_path_buf(),
                        line: number + 1,
                        reason: e.to_string(),
                    })?;
                index.insert((entry.source_path, entry.category_name));
            }
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LedgerError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self { writer, index })
    }

    /// Number of recorded pairs.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no pair has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Ledger for FileLedger {
    fn contains(&self, source_path: &Path, category_name: &str) -> bool {
        self.index
            .contains(&(source_path.to_path_buf(), category_name.to_string()))
    }

    fn record(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        // The pair is unique in the ledger; a repeat append is a no-op.
        if self.contains(&entry.source_path, &entry.category_name) {
            return Ok(());
        }

        let line = serde_json::to_string(&entry).map_err(|e| LedgerError::WriteFailed {
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        })?;

        writeln!(self.writer, "{}", line).map_err(|e| LedgerError::WriteFailed { source: e })?;
        self.writer
            .flush()
            .map_err(|e| LedgerError::WriteFailed { source: e })?;

        self.index
            .insert((entry.source_path, entry.category_name));
        Ok(())
    }
}
