//! Configuration loading and compilation.
//!
//! Configuration is stored in TOML. The reserved `[sync]` section holds
//! global options; every other top-level table defines one category:
//!
//! ```toml
//! [sync]
//! ledger = "~/.local/share/mediasync/ledger.jsonl"
//! sources = ["~/incoming/torrents"]
//! skip_hidden = true
//! ignore = ["*.part", "*.!qB"]
//!
//! [movies]
//! extensions = ["mkv", "mp4"]
//! destination = "~/media/movies"
//! exclude = "(?i)sample"
//! ```
//!
//! Raw configuration is deserialized first, then compiled into runtime
//! structures (`CategoryRule`, glob patterns) so that malformed patterns
//! fail at startup rather than per file. Category tables keep their
//! document order; the orchestrator tests categories in that order.

use crate::category::{CategoryRule, RuleError};
use glob::Pattern;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur during configuration loading and compilation.
///
/// All of these are fatal and reported before any file processing begins.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the explicitly specified path.
    ConfigNotFound(PathBuf),
    /// No configuration file found in any of the default locations.
    NoConfigFound,
    /// Invalid TOML syntax or structure (including missing required fields).
    ConfigInvalid(String),
    /// IO error while reading configuration.
    IoError(String),
    /// The `[sync]` section lists no source roots.
    NoSources,
    /// Invalid glob in the global ignore list.
    InvalidIgnorePattern(String),
    /// A category rule failed to build (reserved name, bad exclusion regex).
    Rule(RuleError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::NoConfigFound => {
                write!(
                    f,
                    "No configuration file found (looked for .mediasyncrc.toml and \
                     ~/.config/mediasync/config.toml)"
                )
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
            ConfigError::NoSources => write!(f, "No source roots configured under [sync]"),
            ConfigError::InvalidIgnorePattern(pattern) => {
                write!(f, "Invalid ignore pattern '{}'", pattern)
            }
            ConfigError::Rule(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<RuleError> for ConfigError {
    fn from(err: RuleError) -> Self {
        ConfigError::Rule(err)
    }
}

/// Raw configuration as deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Global options.
    pub sync: SyncSection,

    /// Every non-reserved top-level table is a category definition.
    /// `IndexMap` keeps the document order.
    #[serde(flatten)]
    pub categories: IndexMap<String, CategorySection>,
}

/// The reserved `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Path of the ledger store, tilde-expandable.
    pub ledger: String,

    /// Source roots to walk, tilde-expandable.
    pub sources: Vec<String>,

    /// Whether to skip dotfiles, and files inside dot-directories below the
    /// source root, during the walk. Defaults to true.
    #[serde(default = "default_skip_hidden")]
    pub skip_hidden: bool,

    /// Glob patterns for files the walk ignores entirely (e.g. partial
    /// downloads).
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_skip_hidden() -> bool {
    true
}

/// One category table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySection {
    /// Case-insensitive extension allow-list; absent or empty means "match
    /// any extension".
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Destination root, tilde-expandable.
    pub destination: String,

    /// Optional exclusion regex tested against the whole source path.
    pub exclude: Option<String>,
}

impl SyncConfig {
    /// Load configuration, trying in order:
    /// 1. The explicitly provided path
    /// 2. `.mediasyncrc.toml` in the current directory
    /// 3. `~/.config/mediasync/config.toml`
    ///
    /// Unlike tools that can run with defaults, a configuration file is
    /// required here: without categories there is nothing to sync.
    ///
    /// # Errors
    ///
    /// Returns an error when no file is found or the found file cannot be
    /// read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".mediasyncrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("mediasync")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Err(ConfigError::NoConfigFound)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile raw configuration into runtime structures, validating all
    /// patterns and expanding tildes.
    ///
    /// # Errors
    ///
    /// Returns an error when no sources are configured, an ignore glob or
    /// exclusion regex is invalid, or a category name is reserved.
    pub fn compile(self) -> Result<CompiledConfig, ConfigError> {
        if self.sync.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let source_roots = self.sync.sources.iter().map(|s| expand_tilde(s)).collect();
        let ledger_path = expand_tilde(&self.sync.ledger);

        let ignore = self
            .sync
            .ignore
            .iter()
            .map(|pattern| {
                Pattern::new(pattern)
                    .map_err(|_| ConfigError::InvalidIgnorePattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut categories = Vec::with_capacity(self.categories.len());
        for (name, section) in &self.categories {
            let rule = CategoryRule::new(
                name,
                &section.extensions,
                &expand_tilde(&section.destination),
                section.exclude.as_deref(),
            )?;
            categories.push(rule);
        }

        Ok(CompiledConfig {
            ledger_path,
            source_roots,
            filters: WalkFilters {
                skip_hidden: self.sync.skip_hidden,
                ignore,
            },
            categories,
        })
    }
}

/// Ready-to-run configuration: immutable, built once at startup and passed
/// explicitly into the orchestrator.
pub struct CompiledConfig {
    /// Where the ledger store lives.
    pub ledger_path: PathBuf,
    /// Directories to walk for candidate files.
    pub source_roots: Vec<PathBuf>,
    /// Filters applied by the walk before classification.
    pub filters: WalkFilters,
    /// Category rules in configuration order.
    pub categories: Vec<CategoryRule>,
}

/// Global file filters applied during enumeration.
pub struct WalkFilters {
    skip_hidden: bool,
    ignore: Vec<Pattern>,
}

impl WalkFilters {
    /// Check whether a discovered file should be offered to the categories.
    ///
    /// The hidden check covers every path component below `source_root`, so
    /// a file inside a dot-directory (`.stash/movie.mkv`) is skipped along
    /// with dotfiles themselves. Components of the root itself are never
    /// inspected.
    pub fn should_include(&self, source_root: &Path, file_path: &Path) -> bool {
        if self.skip_hidden && Self::is_hidden(source_root, file_path) {
            return false;
        }

        !self
            .ignore
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
    }

    fn is_hidden(source_root: &Path, file_path: &Path) -> bool {
        match file_path.strip_prefix(source_root) {
            Ok(relative) => relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.')),
            // Path outside the root: only the file name is safe to judge.
            Err(_) => file_path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(false),
        }
    }
}

/// Expands a leading `~` or `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, std::env::var("HOME").ok().as_deref())
}

fn expand_tilde_with(path: &str, home: Option<&str>) -> PathBuf {
    if let Some(home) = home {
        if path == "~" {
            return PathBuf::from(home);
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
