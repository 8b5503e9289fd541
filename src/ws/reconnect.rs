//! Exponential-backoff reconnection policy.
//!
//! Retry `n` (1-based) waits `base * 2^(n-1)`, optionally spread by a
//! symmetric jitter fraction. After `max_attempts` consecutive failures the
//! policy gives up until a manual reconnect or a successful open resets it.

use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_RECONNECT_BASE_DELAY,
            crate::config::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            crate::config::DEFAULT_RECONNECT_JITTER,
        )
    }
}

impl ReconnectPolicy {
    /// Creates a policy. `jitter` is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(base_delay: Duration, max_attempts: u32, jitter: f64) -> Self {
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            base_delay,
            max_attempts,
            jitter,
        }
    }

    /// Builds the policy described by `config`.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.reconnect_base_delay,
            config.reconnect_max_attempts,
            config.reconnect_jitter,
        )
    }

    /// Maximum number of automatic retries.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry `attempt` (1-based), without jitter.
    #[must_use]
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
    }

    /// Delay before retry `attempt` (1-based), with jitter applied.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
    }
}

/// Outcome of asking the policy for the next retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule retry number `attempt` after `delay`.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Time to wait before reconnecting.
        delay: Duration,
    },
    /// The cap was reached; no retry is scheduled.
    Exhausted {
        /// Number of retries that were made.
        attempts: u32,
    },
}

/// Read-only view of the reconnect bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconnectStatus {
    /// Consecutive retries since the last successful open.
    pub attempts: u32,
    /// Whether a retry timer is currently armed.
    pub pending: bool,
    /// Whether automatic recovery has given up.
    pub exhausted: bool,
    /// Delay of the most recently scheduled retry.
    pub last_delay: Option<Duration>,
}

/// An armed retry timer.
#[derive(Debug)]
pub(crate) struct PendingRetry {
    pub(crate) token: u64,
    pub(crate) handle: JoinHandle<()>,
}

/// Per-client reconnect bookkeeping. At most one timer is armed at a time.
#[derive(Debug, Default)]
pub(crate) struct ReconnectState {
    attempts: u32,
    exhausted: bool,
    last_delay: Option<Duration>,
    pending: Option<PendingRetry>,
    next_token: u64,
}

impl ReconnectState {
    /// Advances the attempt counter, or reports exhaustion.
    pub(crate) fn next_retry(&mut self, policy: &ReconnectPolicy) -> RetryDecision {
        if self.attempts >= policy.max_attempts() {
            self.exhausted = true;
            return RetryDecision::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        let delay = policy.delay_for(self.attempts);
        self.last_delay = Some(delay);
        RetryDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Clears the counter after a successful open or a manual resume.
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
        self.last_delay = None;
    }

    /// Reserves a token for a timer about to be armed.
    pub(crate) fn next_token(&mut self) -> u64 {
        self.next_token = self.next_token.wrapping_add(1);
        self.next_token
    }

    /// Arms `retry`, cancelling any timer that was already pending.
    pub(crate) fn arm(&mut self, retry: PendingRetry) {
        self.cancel_pending();
        self.pending = Some(retry);
    }

    /// Cancels the pending timer, if any. Returns `true` if one was armed.
    pub(crate) fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(retry) => {
                retry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Disarms the timer identified by `token` without aborting it; used by
    /// the timer task itself when it fires. Returns `false` if that timer
    /// was already superseded or cancelled.
    pub(crate) fn take_fired(&mut self, token: u64) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.token == token) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub(crate) const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn status(&self) -> ReconnectStatus {
        ReconnectStatus {
            attempts: self.attempts,
            pending: self.pending.is_some(),
            exhausted: self.exhausted,
            last_delay: self.last_delay,
        }
    }
}
