//! Bounded polling until an observed state converges.
//!
//! [`WaitSpec`] is the single wait loop used for every convergence check:
//! attach, detach, and instance shutdown differ only in the probe they pass
//! and the pending/target sets they configure. Time is read from
//! `tokio::time`, so tests can drive the loop on a paused clock.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Oversized timeouts and intervals collapse to this.
const HORIZON: Duration = Duration::from_secs(30 * 365 * 86_400);

/// Growth policy for the pause between probes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Always pause for the minimum interval.
    Fixed,
    /// Start at the minimum interval and double after each pending
    /// observation, up to `max`.
    Exponential {
        /// Upper bound on a single pause.
        max: Duration,
    },
}

impl Backoff {
    fn next(self, current: Duration, floor: Duration) -> Duration {
        match self {
            Self::Fixed => floor,
            Self::Exponential { max } => current.saturating_mul(2).min(max).max(floor),
        }
    }
}

/// Description of one convergence wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaitSpec<S> {
    pending: Vec<S>,
    target: Vec<S>,
    timeout: Duration,
    delay: Duration,
    min_interval: Duration,
    backoff: Backoff,
    confirmations: u32,
}

/// Reasons a wait stops without converging.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WaitError<S, E>
where
    S: fmt::Display + fmt::Debug,
    E: std::error::Error + 'static,
{
    /// The probe itself failed; waiting stops immediately.
    #[error("probe failed: {0}")]
    Probe(#[source] E),
    /// The probe reported a state outside the pending and target sets.
    #[error("unexpected state '{state}', wanted {expected}")]
    UnexpectedState {
        /// State that was observed.
        state: S,
        /// Target states, rendered for diagnostics.
        expected: String,
    },
    /// The target was not observed before the deadline.
    #[error("timed out after {timeout:?} waiting for {expected} (last state: {})", describe_last(.last))]
    Timeout {
        /// Configured timeout.
        timeout: Duration,
        /// Target states, rendered for diagnostics.
        expected: String,
        /// Last state observed before the deadline, if any probe ran.
        last: Option<S>,
    },
    /// The caller cancelled the wait.
    #[error("wait cancelled")]
    Cancelled,
}

fn describe_last<S: fmt::Display>(last: &Option<S>) -> String {
    last.as_ref()
        .map_or_else(|| String::from("none"), ToString::to_string)
}

impl<S> WaitSpec<S>
where
    S: Clone + fmt::Debug + fmt::Display + PartialEq,
{
    /// Creates a wait with no initial delay, a one second fixed interval, and
    /// a single required target observation.
    #[must_use]
    pub const fn new(pending: Vec<S>, target: Vec<S>, timeout: Duration) -> Self {
        Self {
            pending,
            target,
            timeout,
            delay: Duration::ZERO,
            min_interval: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            confirmations: 1,
        }
    }

    /// Sets the pause before the first probe.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the shortest pause between probes.
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Sets how the pause grows while the state stays pending.
    #[must_use]
    pub const fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets how many consecutive target observations count as converged.
    /// Zero is treated as one.
    #[must_use]
    pub const fn confirmations(mut self, confirmations: u32) -> Self {
        self.confirmations = if confirmations == 0 { 1 } else { confirmations };
        self
    }

    /// Returns the overall timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probes until a target state is observed.
    ///
    /// The deadline covers the initial delay. Pauses are clipped to the
    /// deadline and the probe runs once more at the deadline before the wait
    /// gives up.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Probe`] when the probe fails,
    /// [`WaitError::UnexpectedState`] when it reports a state outside both
    /// sets, [`WaitError::Timeout`] when the deadline passes, and
    /// [`WaitError::Cancelled`] when `cancel` fires during a pause.
    pub async fn wait_for<F, Fut, E>(
        &self,
        mut probe: F,
        cancel: &CancellationToken,
    ) -> Result<S, WaitError<S, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        E: std::error::Error + 'static,
    {
        let deadline = offset(Instant::now(), self.timeout);
        pause_until(cancel, offset(Instant::now(), self.delay).min(deadline)).await?;

        let mut interval = self.min_interval;
        let mut streak = 0_u32;
        loop {
            let state = probe().await.map_err(WaitError::Probe)?;
            debug!(state = %state, "observed state");

            let pause = if self.target.contains(&state) {
                streak = streak.saturating_add(1);
                if streak >= self.confirmations {
                    return Ok(state);
                }
                self.min_interval
            } else if self.pending.contains(&state) {
                streak = 0;
                let current = interval;
                interval = self.backoff.next(interval, self.min_interval);
                current
            } else {
                return Err(WaitError::UnexpectedState {
                    state,
                    expected: self.expected(),
                });
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::Timeout {
                    timeout: self.timeout,
                    expected: self.expected(),
                    last: Some(state),
                });
            }
            pause_until(cancel, offset(now, pause).min(deadline)).await?;
        }
    }

    fn expected(&self) -> String {
        self.target
            .iter()
            .map(|state| format!("'{state}'"))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

/// Adds `span` to `from`, saturating at a horizon decades out.
fn offset(from: Instant, span: Duration) -> Instant {
    from.checked_add(span.min(HORIZON)).unwrap_or(from)
}

async fn pause_until<S, E>(cancel: &CancellationToken, until: Instant) -> Result<(), WaitError<S, E>>
where
    S: fmt::Display + fmt::Debug,
    E: std::error::Error + 'static,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(WaitError::Cancelled),
        () = sleep_until(until) => Ok(()),
    }
}
