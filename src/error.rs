//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for failover operations.
pub type Result<T> = std::result::Result<T, FailoverError>;

/// Errors returned by failover operations.
///
/// Probe failures are not errors; see [`ProbeOutcome`](crate::ProbeOutcome).
#[derive(Debug, Error)]
pub enum FailoverError {
    /// Reading the resolver file (or the settings file) failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file could not be parsed.
    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        /// The settings file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yml::Error,
    },

    /// Invalid configuration values.
    #[error("invalid config: {0}")]
    Config(String),

    /// Writing the staged `.pre` file failed. The resolver file is untouched.
    #[error("failed to stage {}: {source}", .path.display())]
    Stage {
        /// The staging file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Moving the resolver file to its backup name failed. The resolver
    /// file is untouched.
    #[error("failed to back up resolver file to {}: {source}", .backup.display())]
    Backup {
        /// The intended backup path.
        backup: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Moving the staged file into place failed.
    #[error("failed to replace {}: {source}", .path.display())]
    Replace {
        /// The resolver file.
        path: PathBuf,
        /// `true` if the backup was moved back to the original path.
        restored: bool,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl FailoverError {
    /// Wraps an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        let source = match self {
            Self::Io { source, .. }
            | Self::Stage { source, .. }
            | Self::Backup { source, .. }
            | Self::Replace { source, .. } => source,
            _ => return false,
        };
        source.kind() == std::io::ErrorKind::PermissionDenied
    }
}
