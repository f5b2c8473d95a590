/// Destination path derivation for copy operations.
///
/// This module maps a file discovered under a source root to its mirror
/// location under a destination root, preserving the directory structure
/// relative to the source root. It performs no I/O.
use std::path::{Path, PathBuf};

/// Error raised when a discovered path does not live under its declared
/// source root (e.g., symlink resolution drift between the configured root
/// and the walker's output).
#[derive(Debug, Clone)]
pub struct PathMismatchError {
    /// The source root the path was expected to start with.
    pub source_root: PathBuf,
    /// The path that did not match.
    pub source_path: PathBuf,
}

impl std::fmt::Display for PathMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Path {} is not under source root {}",
            self.source_path.display(),
            self.source_root.display()
        )
    }
}

impl std::error::Error for PathMismatchError {}

/// Maps source paths to destination paths for one (source root, destination
/// root) pair.
///
/// Pure value type: construction never fails and `map` has no side effects.
#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    destination_root: PathBuf,
}

impl PathMapper {
    /// Creates a mapper for the given roots.
    ///
    /// Trailing separators on either root are harmless: all path arithmetic
    /// is component-based, so `/src/` and `/src` behave identically.
    pub fn new(source_root: &Path, destination_root: &Path) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
        }
    }

    /// Derives the destination path for `source_path`.
    ///
    /// The structure of `source_path` relative to the source root is
    /// preserved verbatim under the destination root.
    ///
    /// # Errors
    ///
    /// Returns `PathMismatchError` when the source root is not a prefix of
    /// `source_path`.
    pub fn map(&self, source_path: &Path) -> Result<PathBuf, PathMismatchError> {
        let relative = source_path
            .strip_prefix(&self.source_root)
            .map_err(|_| PathMismatchError {
                source_root: self.source_root.clone(),
                source_path: source_path.to_path_buf(),
            })?;

        Ok(self.destination_root.join(relative))
    }
}
