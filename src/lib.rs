//! mediasync - one-way media synchronization into category directories
//!
//! This library copies media files discovered under configured source roots
//! into category-specific destination trees, preserving relative structure,
//! without modifying or deleting the originals. A durable, append-only
//! ledger of (source file, category) pairs makes repeated runs idempotent:
//! already-processed pairs are skipped, failed pairs are retried next run.

pub mod category;
pub mod cli;
pub mod config;
pub mod ledger;
pub mod output;
pub mod path_mapper;
pub mod sync;

pub use category::{CategoryRule, RuleError};
pub use config::{CompiledConfig, ConfigError, SyncConfig};
pub use ledger::{FileLedger, Ledger, LedgerEntry, LedgerError};
pub use path_mapper::{PathMapper, PathMismatchError};
pub use sync::{PairOutcome, SyncOrchestrator, SyncReport};

pub use cli::{SyncOptions, run_cli};
