//! Daemon settings.

use crate::error::{FailoverError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file name, looked up next to the executable.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "resolv-conf-failover-config.yml";

/// Log verbosity accepted in the settings file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every probe and every loop state change.
    Debug,
    /// Recoveries and rewrites.
    #[default]
    Info,
    /// Probe failures and skipped rewrites.
    Warning,
    /// Failed rewrites and unreadable files.
    Error,
}

impl LogLevel {
    /// Returns the matching `tracing` filter directive.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = FailoverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(FailoverError::Config(format!("unknown log level {other:?}"))),
        }
    }
}

/// On-disk layout of the settings file. Intervals are whole seconds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    resolv_conf_path: PathBuf,
    ping_dns_names: Vec<String>,
    health_check_interval: u64,
    #[serde(default)]
    retry_interval: u64,
    #[serde(default)]
    log_level: LogLevel,
}

/// Settings for the health-check loop.
///
/// # Example
///
/// ```
/// use resolv_failover::ResolverConfig;
/// use std::time::Duration;
///
/// let config = ResolverConfig::new("/etc/resolv.conf", ["example.com"])
///     .with_health_check_interval(Duration::from_secs(10))
///     .with_retry_interval(Duration::ZERO);
///
/// assert_eq!(config.ping_names, vec!["example.com"]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// The resolver file to check and rewrite.
    pub resolv_conf_path: PathBuf,

    /// Names queried against the primary, in order.
    pub ping_names: Vec<String>,

    /// Pause between health-check cycles.
    pub health_check_interval: Duration,

    /// Cooldown before the retry probe. Zero retries immediately.
    pub retry_interval: Duration,

    /// Log verbosity.
    pub log_level: LogLevel,
}

impl ResolverConfig {
    /// Creates a config with a 30 s health-check interval and a 5 s retry
    /// interval.
    #[must_use]
    pub fn new<I, S>(resolv_conf_path: impl Into<PathBuf>, ping_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resolv_conf_path: resolv_conf_path.into(),
            ping_names: ping_names.into_iter().map(Into::into).collect(),
            health_check_interval: Duration::from_secs(30),
            retry_interval: Duration::from_secs(5),
            log_level: LogLevel::default(),
        }
    }

    /// Overrides the health-check interval.
    #[must_use]
    pub const fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Overrides the retry interval.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Overrides the log level.
    #[must_use]
    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Parses and validates YAML settings.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::Yaml`] on malformed input and
    /// [`FailoverError::Config`] if validation fails.
    pub fn from_yaml_str(yaml: &str, origin: &Path) -> Result<Self> {
        let raw: RawConfig = serde_yml::from_str(yaml).map_err(|source| FailoverError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;
        let config = Self {
            resolv_conf_path: raw.resolv_conf_path,
            ping_names: raw.ping_dns_names,
            health_check_interval: Duration::from_secs(raw.health_check_interval),
            retry_interval: Duration::from_secs(raw.retry_interval),
            log_level: raw.log_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::Io`] if the file cannot be read, otherwise
    /// as [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| FailoverError::io(path, e))?;
        let config = Self::from_yaml_str(&yaml, path)?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(config)
    }

    /// Checks the invariants the health-check loop relies on.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::Config`] for an empty resolver path, a zero
    /// health-check interval, or a missing or blank ping name.
    pub fn validate(&self) -> Result<()> {
        if self.resolv_conf_path.as_os_str().is_empty() {
            return Err(FailoverError::Config("resolv_conf_path is not set".into()));
        }
        if self.health_check_interval.is_zero() {
            return Err(FailoverError::Config(
                "health_check_interval must be greater than zero".into(),
            ));
        }
        if self.ping_names.is_empty() {
            return Err(FailoverError::Config("ping_dns_names is empty".into()));
        }
        if self.ping_names.iter().any(|n| n.trim().is_empty()) {
            return Err(FailoverError::Config(
                "ping_dns_names contains a blank name".into(),
            ));
        }
        Ok(())
    }
}
