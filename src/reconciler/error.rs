//! Error types for attachment reconciliation.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::cloud::ApiError;
use crate::request::{AttachmentRequest, RequestError};
use crate::wait::WaitError;

/// Step of the attachment lifecycle an error came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Attaching the volume and waiting for it.
    Attach,
    /// Reading the observed attachment.
    Read,
    /// Stopping the owning instance before detach.
    Stop,
    /// Detaching the volume and waiting for it.
    Detach,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Attach => "attach",
            Self::Read => "read",
            Self::Stop => "stop",
            Self::Detach => "detach",
        })
    }
}

/// Mutating command sent to the control plane.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// Attach a volume.
    AttachVolume,
    /// Detach a volume.
    DetachVolume,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AttachVolume => "attach",
            Self::DetachVolume => "detach",
        })
    }
}

/// Errors raised while reconciling an attachment.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReconcileError {
    /// Raised when the request is missing a required field.
    #[error("invalid attachment request: {0}")]
    Validation(#[from] RequestError),
    /// Raised when the control plane refuses an attach or detach command.
    #[error("{command} of volume {volume_id} on instance {instance_id} was rejected: {source}")]
    CommandRejected {
        /// Command that was refused.
        command: Command,
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Classified platform failure.
        source: ApiError,
    },
    /// Raised when a volume wait does not converge in time.
    #[error(
        "timed out after {timeout:?} waiting to {phase} volume {volume_id} on instance {instance_id} (last state: {last_state})"
    )]
    PollTimeout {
        /// Lifecycle step that timed out.
        phase: Phase,
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Configured timeout.
        timeout: Duration,
        /// Last state observed, or `none`.
        last_state: String,
    },
    /// Raised when a probe reports a state outside the expected sets.
    #[error(
        "unexpected state '{state}' during {phase} of volume {volume_id} on instance {instance_id}, wanted {expected}"
    )]
    UnexpectedState {
        /// Lifecycle step that observed the state.
        phase: Phase,
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// State that was observed.
        state: String,
        /// Target states.
        expected: String,
    },
    /// Raised when the owning instance does not stop in time; detach is not
    /// attempted.
    #[error(
        "instance {instance_id} did not stop within {timeout:?} (last state: {last_state}); volume {volume_id} left attached"
    )]
    StopTimeout {
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Configured timeout.
        timeout: Duration,
        /// Last state observed, or `none`.
        last_state: String,
    },
    /// Raised when a state query fails for a reason other than not-found.
    #[error("{phase} query for volume {volume_id} on instance {instance_id} failed: {source}")]
    Probe {
        /// Lifecycle step running the query.
        phase: Phase,
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Classified platform failure.
        source: ApiError,
    },
    /// Raised when the caller cancels a wait.
    #[error("{phase} of volume {volume_id} on instance {instance_id} was cancelled")]
    Cancelled {
        /// Lifecycle step that was waiting.
        phase: Phase,
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
    },
    /// Raised when the attachment cannot be read back right after attaching.
    #[error("volume {volume_id} reported attached to instance {instance_id} but is no longer visible")]
    NotObservedAfterAttach {
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
    },
}

impl ReconcileError {
    pub(crate) fn command_rejected(
        command: Command,
        request: &AttachmentRequest,
        source: ApiError,
    ) -> Self {
        Self::CommandRejected {
            command,
            volume_id: request.volume_id.clone(),
            instance_id: request.instance_id.clone(),
            source,
        }
    }

    pub(crate) fn probe(phase: Phase, request: &AttachmentRequest, source: ApiError) -> Self {
        Self::Probe {
            phase,
            volume_id: request.volume_id.clone(),
            instance_id: request.instance_id.clone(),
            source,
        }
    }

    pub(crate) fn from_wait<S>(
        phase: Phase,
        request: &AttachmentRequest,
        err: WaitError<S, ApiError>,
    ) -> Self
    where
        S: fmt::Display + fmt::Debug,
    {
        let volume_id = request.volume_id.clone();
        let instance_id = request.instance_id.clone();
        match err {
            WaitError::Probe(source) => Self::Probe {
                phase,
                volume_id,
                instance_id,
                source,
            },
            WaitError::UnexpectedState { state, expected } => Self::UnexpectedState {
                phase,
                volume_id,
                instance_id,
                state: state.to_string(),
                expected,
            },
            WaitError::Timeout { timeout, last, .. } => {
                let last_state = last.map_or_else(|| String::from("none"), |state| state.to_string());
                if phase == Phase::Stop {
                    Self::StopTimeout {
                        volume_id,
                        instance_id,
                        timeout,
                        last_state,
                    }
                } else {
                    Self::PollTimeout {
                        phase,
                        volume_id,
                        instance_id,
                        timeout,
                        last_state,
                    }
                }
            }
            WaitError::Cancelled => Self::Cancelled {
                phase,
                volume_id,
                instance_id,
            },
        }
    }
}
