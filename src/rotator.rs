//! Nameserver rotation and the staged, backup-preserving rewrite.
//!
//! A rewrite goes through three filesystem steps:
//!
//! 1. the new content is written to `<path>.pre`;
//! 2. `<path>` is renamed to `<path>.save.<YYYYMMDDHHMMSS>`;
//! 3. `<path>.pre` is renamed to `<path>`.
//!
//! Each rename is atomic, the pair is not. If the process dies between (2)
//! and (3) the resolver file is missing until `<path>.pre` is moved into
//! place by hand. The backup from step (2) is never removed by this crate.

use crate::conf::{ConfigLines, Line, NAMESERVER_DIRECTIVE, read_nameservers};
use crate::error::{FailoverError, Result};
use chrono::NaiveDateTime;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix of the staging file written before the swap.
pub const STAGING_SUFFIX: &str = ".pre";

/// Infix between the original path and the backup timestamp.
pub const BACKUP_INFIX: &str = ".save.";

/// `strftime` format of the backup timestamp.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Outcome of a [`ConfigRotator::rotate`] call that did not fail with an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationResult {
    /// The file was rewritten.
    Rotated {
        /// Nameserver order before the rewrite.
        old: Vec<String>,
        /// Nameserver order after the rewrite.
        new: Vec<String>,
        /// Where the previous file now lives.
        backup: PathBuf,
    },
    /// The file has no nameserver lines. Nothing was written.
    NothingToRotate,
    /// The file changed under us between reads. Nothing was written.
    Aborted {
        /// The nameservers the rotation was computed from.
        expected: Vec<String>,
        /// The nameservers found when rendering.
        found: Vec<String>,
    },
}

/// More nameserver lines than addresses to put in them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMismatch {
    /// Nameserver lines in the file.
    pub slots: usize,
    /// Addresses available.
    pub addresses: usize,
}

/// Cyclic left rotation: the primary moves to the end.
///
/// `new[i] == old[(i + 1) % n]`. An empty list stays empty.
#[must_use]
pub fn rotate_left(nameservers: &[String]) -> Vec<String> {
    let mut rotated = nameservers.to_vec();
    if !rotated.is_empty() {
        rotated.rotate_left(1);
    }
    rotated
}

/// Renders `lines` with the k-th nameserver line replaced by
/// `addresses[k]`.
///
/// Other lines are emitted verbatim. A replaced line keeps its leading
/// indentation and line terminator; an inline comment on it is dropped.
///
/// # Errors
///
/// Returns [`SlotMismatch`] if there are more nameserver lines than
/// addresses.
pub fn render(
    lines: &ConfigLines,
    addresses: &[String],
) -> std::result::Result<String, SlotMismatch> {
    let mismatch = SlotMismatch {
        slots: lines.nameserver_slots(),
        addresses: addresses.len(),
    };
    let mut remaining = addresses.iter();
    let mut out = String::new();
    for line in lines.lines() {
        match line {
            Line::Other(raw) => out.push_str(raw),
            Line::Nameserver { raw, .. } => {
                let address = remaining.next().ok_or(mismatch)?;
                let indent = &raw[..raw.len() - raw.trim_start().len()];
                out.push_str(indent);
                out.push_str(NAMESERVER_DIRECTIVE);
                out.push(' ');
                out.push_str(address);
                out.push_str(line_terminator(raw));
            }
        }
    }
    Ok(out)
}

fn line_terminator(raw: &str) -> &'static str {
    if raw.ends_with("\r\n") {
        "\r\n"
    } else if raw.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Returns `<path>.pre`.
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    with_suffix(path, STAGING_SUFFIX)
}

/// Returns `<path>.save.<YYYYMMDDHHMMSS>` for `timestamp`.
#[must_use]
pub fn backup_path(path: &Path, timestamp: NaiveDateTime) -> PathBuf {
    with_suffix(
        path,
        &format!("{BACKUP_INFIX}{}", timestamp.format(BACKUP_TIMESTAMP_FORMAT)),
    )
}

/// Returns [`backup_path`], or `<backup>.<n>` with the smallest `n` that
/// is not taken when several rewrites share a second.
fn unused_backup_path(path: &Path, timestamp: NaiveDateTime) -> PathBuf {
    let backup = backup_path(path, timestamp);
    if !backup.exists() {
        return backup;
    }
    (1u32..)
        .map(|n| with_suffix(&backup, &format!(".{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(backup)
}

/// Rewrites a resolver file with its primary nameserver demoted.
#[derive(Debug, Clone)]
pub struct ConfigRotator {
    path: PathBuf,
}

impl ConfigRotator {
    /// Creates a rotator for the resolver file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the resolver file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotates the nameservers, stamping the backup with the local time.
    ///
    /// # Errors
    ///
    /// See [`rotate_at`](Self::rotate_at).
    pub fn rotate(&self) -> Result<RotationResult> {
        self.rotate_at(chrono::Local::now().naive_local())
    }

    /// Rotates the nameservers, stamping the backup with `timestamp`.
    ///
    /// # Errors
    ///
    /// See [`rotate_from`](Self::rotate_from).
    pub fn rotate_at(&self, timestamp: NaiveDateTime) -> Result<RotationResult> {
        let current = read_nameservers(&self.path)?;
        self.rotate_from(&current, timestamp)
    }

    /// Rotates `probed`, the nameserver list the failover decision was made
    /// on, stamping the backup with `timestamp`.
    ///
    /// The file is read fresh. If its nameserver lines no longer match
    /// `probed`, the rewrite is skipped and [`RotationResult::Aborted`] is
    /// returned. An existing backup is never overwritten.
    ///
    /// # Errors
    ///
    /// - [`FailoverError::Io`] if the file cannot be read.
    /// - [`FailoverError::Stage`], [`FailoverError::Backup`] or
    ///   [`FailoverError::Replace`] if a filesystem step fails. In the first
    ///   two cases the resolver file is untouched.
    pub fn rotate_from(
        &self,
        probed: &[String],
        timestamp: NaiveDateTime,
    ) -> Result<RotationResult> {
        self.rotate_with(probed, timestamp, |from, to| std::fs::rename(from, to))
    }

    fn rotate_with<R>(
        &self,
        probed: &[String],
        timestamp: NaiveDateTime,
        rename: R,
    ) -> Result<RotationResult>
    where
        R: Fn(&Path, &Path) -> std::io::Result<()>,
    {
        let path = self.path.as_path();
        tracing::debug!(path = %path.display(), "Rewriting resolver file");

        if probed.is_empty() {
            return Ok(RotationResult::NothingToRotate);
        }
        let old = probed.to_vec();
        let new = rotate_left(&old);

        let lines = ConfigLines::read(path)?;
        let found = lines.nameservers();
        let content = match render(&lines, &new) {
            Ok(content) if found == old => content,
            _ => {
                tracing::warn!(
                    path = %path.display(),
                    expected = ?old,
                    found = ?found,
                    "Resolver file changed before rewrite, leaving it untouched"
                );
                return Ok(RotationResult::Aborted {
                    expected: old,
                    found,
                });
            }
        };

        let backup = unused_backup_path(path, timestamp);

        let staging = staging_path(path);
        if let Err(source) = write_staged(&staging, &content, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(FailoverError::Stage {
                path: staging,
                source,
            });
        }
        tracing::debug!(path = %staging.display(), "Staged new resolver file");

        if let Err(source) = rename(path, &backup) {
            let _ = std::fs::remove_file(&staging);
            return Err(FailoverError::Backup { backup, source });
        }

        if let Err(source) = rename(&staging, path) {
            let restored = rename(&backup, path).is_ok();
            if restored {
                let _ = std::fs::remove_file(&staging);
            }
            return Err(FailoverError::Replace {
                path: path.to_path_buf(),
                restored,
                source,
            });
        }

        tracing::info!(
            path = %path.display(),
            backup = %backup.display(),
            old = ?old,
            new = ?new,
            "Rotated nameservers"
        );
        Ok(RotationResult::Rotated { old, new, backup })
    }
}

fn write_staged(staging: &Path, content: &str, original: &Path) -> std::io::Result<()> {
    let mut file = File::create(staging)?;
    file.write_all(content.as_bytes())?;
    if let Ok(meta) = std::fs::metadata(original) {
        file.set_permissions(meta.permissions())?;
    }
    file.sync_all()
}
