//! Line-oriented `resolv.conf` parsing.
//!
//! A file is kept as the full sequence of its raw lines so that a rewrite
//! can reproduce everything except the nameserver addresses byte for byte.

use crate::error::{FailoverError, Result};
use std::path::Path;

/// The directive keyword that marks a nameserver line.
pub const NAMESERVER_DIRECTIVE: &str = "nameserver";

/// One raw line of a resolver file, including its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A `nameserver <address>` line.
    Nameserver {
        /// The address token.
        address: String,
        /// The line as it appeared on disk.
        raw: String,
    },
    /// Anything else: comments, options, search lists, blank lines.
    Other(String),
}

impl Line {
    /// Classifies a single raw line.
    ///
    /// The first whitespace-delimited token must be exactly
    /// [`NAMESERVER_DIRECTIVE`], and an address token must follow. The
    /// address ends at whitespace or at an inline `#`/`;` comment.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let mut tokens = raw.split_whitespace();
        if tokens.next() != Some(NAMESERVER_DIRECTIVE) {
            return Self::Other(raw.to_string());
        }
        let address = tokens
            .next()
            .and_then(|t| t.split(['#', ';']).next())
            .filter(|a| !a.is_empty());
        match address {
            Some(address) => Self::Nameserver {
                address: address.to_string(),
                raw: raw.to_string(),
            },
            None => Self::Other(raw.to_string()),
        }
    }

    /// Returns the line as it appeared on disk.
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Nameserver { raw, .. } | Self::Other(raw) => raw,
        }
    }

    /// Returns `true` for a nameserver line.
    #[must_use]
    pub const fn is_nameserver(&self) -> bool {
        matches!(self, Self::Nameserver { .. })
    }
}

/// Every line of a resolver file, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLines {
    lines: Vec<Line>,
}

impl ConfigLines {
    /// Parses file content. Never fails; unrecognised lines are kept as
    /// [`Line::Other`].
    #[must_use]
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.split_inclusive('\n').map(Line::classify).collect(),
        }
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::Io`] if the file cannot be read.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FailoverError::io(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Returns the parsed lines.
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Returns the nameserver addresses in file order.
    #[must_use]
    pub fn nameservers(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Nameserver { address, .. } => Some(address.clone()),
                Line::Other(_) => None,
            })
            .collect()
    }

    /// Number of nameserver lines.
    #[must_use]
    pub fn nameserver_slots(&self) -> usize {
        self.lines.iter().filter(|l| l.is_nameserver()).count()
    }
}

/// Reads the ordered nameserver list from the resolver file at `path`.
///
/// An empty list is not an error; it means there is no operational
/// nameserver. Callers decide whether that is worth a warning.
///
/// # Errors
///
/// Returns [`FailoverError::Io`] if the file cannot be read.
pub fn read_nameservers(path: &Path) -> Result<Vec<String>> {
    Ok(ConfigLines::read(path)?.nameservers())
}
