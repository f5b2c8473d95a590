//! Category matching rules.
//!
//! A category pairs a named destination tree with a membership predicate:
//! an extension allow-list and an optional exclusion regex. All matching is
//! pure and filesystem-free so rules can be tested in isolation.

use regex::Regex;
use std::path::{Path, PathBuf};

/// Section names in the configuration file that hold global options and are
/// therefore unavailable as category names.
pub const RESERVED_SECTION_NAMES: &[&str] = &["sync"];

/// Errors raised while constructing a category rule.
#[derive(Debug, Clone)]
pub enum RuleError {
    /// The category name collides with a reserved configuration section.
    ReservedName(String),
    /// The exclusion regex failed to compile.
    InvalidExclusionPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The regex engine's reason.
        reason: String,
    },
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleError::ReservedName(name) => {
                write!(f, "Category name '{}' is reserved for global options", name)
            }
            RuleError::InvalidExclusionPattern { pattern, reason } => {
                write!(f, "Invalid exclusion pattern '{}': {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// A named classification rule mapping matching source files to one
/// destination root.
///
/// Immutable after construction; built once per run from configuration.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    name: String,
    /// Lowercased extension suffixes without the leading dot. Empty means
    /// "match any extension".
    extensions: Vec<String>,
    exclusion: Option<Regex>,
    destination_root: PathBuf,
}

impl CategoryRule {
    /// Builds a rule, compiling the exclusion pattern eagerly.
    ///
    /// # Errors
    ///
    /// Fails when `name` collides with a reserved configuration section or
    /// when `exclusion_pattern` is not a valid regex. Pattern validation
    /// happens here, at startup, never per file.
    pub fn new(
        name: &str,
        extensions: &[String],
        destination_root: &Path,
        exclusion_pattern: Option<&str>,
    ) -> Result<Self, RuleError> {
        if RESERVED_SECTION_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return Err(RuleError::ReservedName(name.to_string()));
        }

        let exclusion = exclusion_pattern
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| RuleError::InvalidExclusionPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let extensions = extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            name: name.to_string(),
            extensions,
            exclusion,
            destination_root: destination_root.to_path_buf(),
        })
    }

    /// The category's unique name, also used as the ledger's category key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root directory this category's matches are mirrored under.
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// Decides whether `path` belongs to this category.
    ///
    /// Extension comparison is case-insensitive and anchored at the end of
    /// the path as `.{ext}`, so an extension appearing as a substring
    /// earlier in the path never matches. The exclusion regex, when
    /// configured, is tested against the whole path and rejects the file
    /// regardless of extension.
    pub fn belongs(&self, path: &Path) -> bool {
        if !self.extension_matches(path) {
            return false;
        }

        match &self.exclusion {
            Some(regex) => !regex.is_match(&path.to_string_lossy()),
            None => true,
        }
    }

    fn extension_matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }

        let lowered = path.to_string_lossy().to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lowered.ends_with(&format!(".{}", ext)))
    }
}
