//! `resolv-failover`: health-check the primary nameserver and rotate on
//! failure.

use anyhow::{Context, Result};
use clap::Parser;
use resolv_failover::config::DEFAULT_CONFIG_FILE_NAME;
use resolv_failover::{CycleOutcome, HealthCheckLoop, HickoryProbe, LogLevel, ResolverConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Rotate resolv.conf nameservers when the primary stops answering.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML settings file. Defaults to
    /// `resolv-conf-failover-config.yml` next to the executable.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the log level from the settings file.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Run a single health-check cycle and exit.
    #[arg(long)]
    once: bool,
}

fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE_NAME))
}

fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Flips the shutdown channel on Ctrl-C or SIGTERM.
async fn wait_for_signal(tx: watch::Sender<bool>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                let _ = ctrl_c.await;
                let _ = tx.send(true);
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    let _ = ctrl_c.await;

    tracing::info!("Shutdown requested");
    let _ = tx.send(true);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);

    let config = match ResolverConfig::from_yaml_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.unwrap_or_default());
            tracing::error!(error = %e, "Failed to load settings");
            std::process::exit(1);
        }
    };
    let level = cli.log_level.unwrap_or(config.log_level);
    let config = config.with_log_level(level);
    init_logging(level);
    tracing::info!(
        config = %config_path.display(),
        level = level.as_filter(),
        "resolv-failover starting"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let (tx, rx) = watch::channel(false);
        let mut health = HealthCheckLoop::new(config, HickoryProbe::new(), rx);
        if cli.once {
            let outcome = health.run_cycle().await;
            tracing::info!(?outcome, "Single cycle finished");
            if matches!(outcome, CycleOutcome::ReadFailed | CycleOutcome::RewriteFailed) {
                anyhow::bail!("health check cycle failed: {outcome:?}");
            }
            return Ok(());
        }
        // The loop stops at its next transition once the signal task fires.
        tokio::join!(health.run(), wait_for_signal(tx));
        Ok(())
    })
}
