//! Retry-before-failover rule.
//!
//! A single failed probe never rewrites the resolver file. The failure has
//! to survive one retry, issued after `retry_interval`, before it counts as
//! an outage.

use crate::probe::ProbeOutcome;
use std::time::Duration;

/// Which probe of a ping name an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The first probe of this ping name in the current cycle.
    First,
    /// The single retry after a failed first probe.
    Retry,
}

/// What the health-check loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The primary answered; go on to the next ping name.
    Continue,
    /// Probe the same name again, after `wait` if set.
    Retry {
        /// Cooldown before the retry. `None` retries immediately.
        wait: Option<Duration>,
    },
    /// The retry answered; go on to the next ping name.
    Recovered,
    /// The retry failed too; rotate the nameservers and end the cycle.
    Failover,
}

/// Maps probe outcomes to loop actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    retry_interval: Duration,
}

impl FailoverPolicy {
    /// Creates a policy. A zero `retry_interval` retries without waiting.
    #[must_use]
    pub const fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    /// Returns the retry cooldown.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Decides the next action for `outcome` of `attempt`.
    #[must_use]
    pub const fn decide(&self, attempt: Attempt, outcome: &ProbeOutcome) -> Action {
        match (attempt, outcome.is_success()) {
            (Attempt::First, true) => Action::Continue,
            (Attempt::First, false) => Action::Retry {
                wait: if self.retry_interval.is_zero() {
                    None
                } else {
                    Some(self.retry_interval)
                },
            },
            (Attempt::Retry, true) => Action::Recovered,
            (Attempt::Retry, false) => Action::Failover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeFailure;

    fn failure() -> ProbeOutcome {
        ProbeOutcome::Failure(ProbeFailure::EmptyAnswer)
    }

    #[test]
    fn success_continues() {
        let policy = FailoverPolicy::new(Duration::from_secs(5));
        assert_eq!(policy.decide(Attempt::First, &ProbeOutcome::Success), Action::Continue);
    }

    #[test]
    fn first_failure_waits_then_retries() {
        let policy = FailoverPolicy::new(Duration::from_secs(5));
        assert_eq!(
            policy.decide(Attempt::First, &failure()),
            Action::Retry {
                wait: Some(Duration::from_secs(5))
            }
        );
    }

    #[test]
    fn zero_interval_retries_immediately() {
        let policy = FailoverPolicy::new(Duration::ZERO);
        assert_eq!(
            policy.decide(Attempt::First, &failure()),
            Action::Retry { wait: None }
        );
    }

    #[test]
    fn retry_outcomes() {
        let policy = FailoverPolicy::new(Duration::ZERO);
        assert_eq!(policy.decide(Attempt::Retry, &ProbeOutcome::Success), Action::Recovered);
        assert_eq!(policy.decide(Attempt::Retry, &failure()), Action::Failover);
    }
}
