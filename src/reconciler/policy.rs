//! Wait timings applied by the reconciler.

use std::time::Duration;

use crate::cloud::{AttachmentState, InstanceState};
use crate::wait::{Backoff, WaitSpec};

/// Timings and convergence rules for the three waits the reconciler runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReconcilePolicy {
    /// Upper bound on waiting for a volume to become attached.
    pub attach_timeout: Duration,
    /// Upper bound on waiting for a volume to become detached.
    pub detach_timeout: Duration,
    /// Upper bound on waiting for the owning instance to stop.
    pub stop_timeout: Duration,
    /// Pause before the first probe of every wait.
    pub initial_delay: Duration,
    /// Shortest pause between probes.
    pub min_poll_interval: Duration,
    /// Longest pause between probes once backoff has grown.
    pub max_poll_interval: Duration,
    /// Consecutive `detached` observations required before a detach counts
    /// as complete.
    pub detach_confirmations: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            attach_timeout: Duration::from_secs(5 * 60),
            detach_timeout: Duration::from_secs(5 * 60),
            stop_timeout: Duration::from_secs(10 * 60),
            initial_delay: Duration::from_secs(10),
            min_poll_interval: Duration::from_secs(3),
            max_poll_interval: Duration::from_secs(10),
            detach_confirmations: 1,
        }
    }
}

impl ReconcilePolicy {
    fn shaped<S>(&self, spec: WaitSpec<S>) -> WaitSpec<S>
    where
        S: Clone + std::fmt::Debug + std::fmt::Display + PartialEq,
    {
        spec.delay(self.initial_delay)
            .min_interval(self.min_poll_interval)
            .backoff(Backoff::Exponential {
                max: self.max_poll_interval,
            })
    }

    pub(crate) fn attach_wait(&self) -> WaitSpec<AttachmentState> {
        self.shaped(WaitSpec::new(
            vec![AttachmentState::Attaching],
            vec![AttachmentState::Attached],
            self.attach_timeout,
        ))
    }

    pub(crate) fn detach_wait(&self) -> WaitSpec<AttachmentState> {
        self.shaped(WaitSpec::new(
            vec![AttachmentState::Detaching],
            vec![AttachmentState::Detached],
            self.detach_timeout,
        ))
        .confirmations(self.detach_confirmations)
    }

    // An instance that disappears while stopping has nothing left to wait on.
    pub(crate) fn stop_wait(&self) -> WaitSpec<InstanceState> {
        self.shaped(WaitSpec::new(
            vec![InstanceState::Stopping],
            vec![InstanceState::Stopped, InstanceState::Absent],
            self.stop_timeout,
        ))
    }
}
