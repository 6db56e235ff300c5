//! # resolv-failover
//!
//! Keep the primary nameserver in `/etc/resolv.conf` alive.
//!
//! A [`HealthCheckLoop`] periodically queries a list of probe names against
//! the first nameserver listed in the resolver file. If a probe fails, and a
//! single retry after a cooldown fails too, the nameserver order is rotated
//! so the next entry becomes primary. Everything else in the file (comments,
//! `search`, `options`, blank lines) is kept verbatim.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use resolv_failover::{HealthCheckLoop, HickoryProbe, ResolverConfig};
//! use std::time::Duration;
//!
//! let config = ResolverConfig::new("/etc/resolv.conf", ["example.com"])
//!     .with_health_check_interval(Duration::from_secs(30))
//!     .with_retry_interval(Duration::from_secs(5));
//!
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! HealthCheckLoop::new(config, HickoryProbe::new(), stop_rx).run().await;
//! ```
//!
//! ## Rewrites
//!
//! Each failover writes `<path>.pre`, renames the current file to
//! `<path>.save.<YYYYMMDDHHMMSS>` and renames `<path>.pre` into place. Backups
//! are never deleted; prune them with your own tooling.
//!
//! A single failover can also be driven directly:
//!
//! ```rust,ignore
//! use resolv_failover::{ConfigRotator, RotationResult};
//!
//! match ConfigRotator::new("/etc/resolv.conf").rotate()? {
//!     RotationResult::Rotated { old, new, backup } => {
//!         println!("{old:?} -> {new:?}, saved {}", backup.display());
//!     }
//!     RotationResult::NothingToRotate | RotationResult::Aborted { .. } => {}
//! }
//! ```
//!
//! ## Permissions
//!
//! Rewriting `/etc/resolv.conf` requires write access to `/etc`. The caller
//! is responsible for running with sufficient privileges.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod conf;
pub mod config;
pub mod error;
pub mod health_loop;
pub mod policy;
pub mod probe;
pub mod rotator;

pub use conf::{ConfigLines, Line, read_nameservers};
pub use config::{LogLevel, ResolverConfig};
pub use error::{FailoverError, Result};
pub use health_loop::{CycleOutcome, HealthCheckLoop, LoopState};
pub use policy::{Action, Attempt, FailoverPolicy};
pub use probe::{HealthProbe, HickoryProbe, ProbeFailure, ProbeOutcome};
pub use rotator::{ConfigRotator, RotationResult, rotate_left};
