//! The long-running health-check scheduler.
//!
//! One cycle probes every ping name against the current primary, in order.
//! A failure that survives its retry rotates the nameservers and ends the
//! cycle early. Cycles never overlap: the inter-cycle sleep only starts once
//! the previous cycle, including any retry wait and rewrite, is done.
//!
//! Every state transition checks the shutdown channel, and both sleeps race
//! it, so a stop request is honoured between steps.

use crate::conf::read_nameservers;
use crate::config::ResolverConfig;
use crate::policy::{Action, Attempt, FailoverPolicy};
use crate::probe::{HealthProbe, ProbeOutcome};
use crate::rotator::{ConfigRotator, RotationResult};
use std::time::Duration;
use tokio::sync::watch;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Between cycles.
    Idle,
    /// Issuing a probe.
    Probing,
    /// Waiting `retry_interval` before the retry probe.
    RetryWait,
    /// Rotating the resolver file.
    Rewriting,
}

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every ping name resolved on the first try.
    Healthy,
    /// At least one ping name needed its retry, and every retry succeeded.
    Recovered,
    /// The resolver file lists no nameservers. Nothing was probed.
    NoNameservers,
    /// The resolver file could not be read.
    ReadFailed,
    /// A failover was attempted and `rotate` returned.
    Rewritten(RotationResult),
    /// A failover was attempted and the rewrite failed. The file is left as
    /// it was.
    RewriteFailed,
    /// Shutdown was requested mid-cycle.
    Cancelled,
}

/// Probes the primary nameserver on a fixed cadence and fails over when it
/// stops answering.
///
/// # Example
///
/// ```rust,ignore
/// use resolv_failover::{HealthCheckLoop, HickoryProbe, ResolverConfig};
///
/// let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
/// let config = ResolverConfig::new("/etc/resolv.conf", ["example.com"]);
/// HealthCheckLoop::new(config, HickoryProbe::new(), stop_rx).run().await;
/// ```
pub struct HealthCheckLoop<P> {
    config: ResolverConfig,
    probe: P,
    policy: FailoverPolicy,
    rotator: ConfigRotator,
    shutdown: watch::Receiver<bool>,
    state: LoopState,
}

impl<P: HealthProbe> HealthCheckLoop<P> {
    /// Creates a loop in the [`LoopState::Idle`] state.
    ///
    /// Sending `true` on the channel (or dropping its sender) stops the
    /// loop at the next state transition or sleep.
    pub fn new(config: ResolverConfig, probe: P, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            policy: FailoverPolicy::new(config.retry_interval),
            rotator: ConfigRotator::new(config.resolv_conf_path.clone()),
            config,
            probe,
            shutdown,
            state: LoopState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Runs cycles until shutdown is requested.
    pub async fn run(mut self) {
        tracing::info!(
            path = %self.config.resolv_conf_path.display(),
            ping_names = ?self.config.ping_names,
            interval = ?self.config.health_check_interval,
            retry_interval = ?self.config.retry_interval,
            "Starting health check loop"
        );
        loop {
            if self.run_cycle().await == CycleOutcome::Cancelled {
                break;
            }
            let interval = self.config.health_check_interval;
            tracing::debug!(interval = ?interval, "Sleeping until next health check");
            if !self.sleep(interval).await {
                break;
            }
        }
        tracing::info!("Health check loop stopped");
    }

    /// Runs one failover cycle and returns to [`LoopState::Idle`].
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        tracing::debug!("Starting health check cycle");
        let outcome = self.evaluate().await;
        self.transition(LoopState::Idle);
        outcome
    }

    async fn evaluate(&mut self) -> CycleOutcome {
        let path = self.config.resolv_conf_path.clone();
        let ping_names = self.config.ping_names.clone();
        let mut recovered = false;

        for name in &ping_names {
            let mut attempt = Attempt::First;
            loop {
                if !self.transition(LoopState::Probing) {
                    return CycleOutcome::Cancelled;
                }
                // Re-read before every probe; the file may be edited externally.
                let nameservers = match read_nameservers(&path) {
                    Ok(nameservers) => nameservers,
                    Err(e) => {
                        tracing::error!(error = %e, "Cannot read resolver file, skipping cycle");
                        return CycleOutcome::ReadFailed;
                    }
                };
                let Some(primary) = nameservers.first() else {
                    tracing::warn!(
                        path = %path.display(),
                        "No nameservers to check, skipping cycle"
                    );
                    return CycleOutcome::NoNameservers;
                };

                tracing::debug!(name = %name, nameserver = %primary, ?attempt, "Health check");
                let outcome = self.probe.probe(name, &nameservers).await;
                match self.policy.decide(attempt, &outcome) {
                    Action::Continue => {
                        tracing::debug!(name = %name, "Health check passed");
                        break;
                    }
                    Action::Retry { wait } => {
                        tracing::warn!(
                            name = %name,
                            nameserver = %primary,
                            reason = %failure_reason(&outcome),
                            retry_in = ?wait.unwrap_or_default(),
                            "Probe failed, retrying"
                        );
                        if let Some(wait) = wait {
                            if !self.transition(LoopState::RetryWait) || !self.sleep(wait).await {
                                return CycleOutcome::Cancelled;
                            }
                        }
                        attempt = Attempt::Retry;
                    }
                    Action::Recovered => {
                        tracing::info!(name = %name, nameserver = %primary, "Retry succeeded");
                        recovered = true;
                        break;
                    }
                    Action::Failover => {
                        tracing::error!(
                            name = %name,
                            nameserver = %primary,
                            reason = %failure_reason(&outcome),
                            path = %path.display(),
                            "Retry failed, rotating nameservers"
                        );
                        return self.rewrite(&nameservers);
                    }
                }
            }
        }

        if recovered {
            CycleOutcome::Recovered
        } else {
            CycleOutcome::Healthy
        }
    }

    /// Rotates `probed`, the list the failed retry ran against. The rotator
    /// aborts if the file no longer matches it.
    fn rewrite(&mut self, probed: &[String]) -> CycleOutcome {
        if !self.transition(LoopState::Rewriting) {
            return CycleOutcome::Cancelled;
        }
        match self.rotator.rotate_from(probed, chrono::Local::now().naive_local()) {
            Ok(result) => CycleOutcome::Rewritten(result),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    permission_denied = e.is_permission_denied(),
                    "Rewrite failed, resolver file left as it was"
                );
                CycleOutcome::RewriteFailed
            }
        }
    }

    /// Moves to `next`. Returns `false` if shutdown has been requested, in
    /// which case the caller must stop.
    fn transition(&mut self, next: LoopState) -> bool {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "Loop state");
            self.state = next;
        }
        !self.is_shutdown()
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    /// Sleeps for `duration`. Returns `false` if woken by shutdown.
    async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return false;
        }
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow_and_update() {
                        return false;
                    }
                }
            }
        }
    }
}

fn failure_reason(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Success => "none".to_string(),
        ProbeOutcome::Failure(reason) => reason.to_string(),
    }
}
