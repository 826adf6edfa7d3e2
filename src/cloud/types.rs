//! Observed control-plane records and state enums.
//!
//! Parsing from provider strings is total: anything unrecognised lands in an
//! `Other` variant so the poller can report it verbatim.

use std::fmt;

/// Attachment state of a volume on one instance.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum AttachmentState {
    /// The attach command was accepted and is in progress.
    Attaching,
    /// The volume is attached.
    Attached,
    /// The detach command was accepted and is in progress.
    Detaching,
    /// The volume is no longer attached, or no attachment record exists.
    Detached,
    /// The provider reports the attachment as busy.
    Busy,
    /// The provider reports the attachment as failed.
    Failed,
    /// Any other provider state.
    Other(String),
}

impl AttachmentState {
    /// Returns the provider spelling of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
            Self::Detached => "detached",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for AttachmentState {
    fn from(value: &str) -> Self {
        match value {
            "attaching" => Self::Attaching,
            "attached" => Self::Attached,
            "detaching" => Self::Detaching,
            "detached" => Self::Detached,
            "busy" => Self::Busy,
            "failed" => Self::Failed,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power state of an instance.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum InstanceState {
    /// The instance is booting.
    Pending,
    /// The instance is running.
    Running,
    /// A stop is in progress.
    Stopping,
    /// The instance is stopped.
    Stopped,
    /// A termination is in progress.
    ShuttingDown,
    /// The instance is terminated.
    Terminated,
    /// The control plane does not know the instance.
    Absent,
    /// Any other provider state.
    Other(String),
}

impl InstanceState {
    /// Returns the provider spelling of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Absent => "absent",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for InstanceState {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a volume, independent of any one attachment.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum VolumeStatus {
    /// The volume is not attached to anything.
    Available,
    /// The volume is attached somewhere.
    InUse,
    /// Any other provider status.
    Other(String),
}

impl VolumeStatus {
    /// Returns the provider spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for VolumeStatus {
    fn from(value: &str) -> Self {
        match value {
            "available" => Self::Available,
            "in-use" | "in_use" => Self::InUse,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attachment entry reported for a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachmentRecord {
    /// Instance holding the attachment, when the provider reports one.
    pub instance_id: Option<String>,
    /// Device name reported by the provider, if any.
    pub device_name: Option<String>,
    /// Attachment state.
    pub state: AttachmentState,
}

/// A volume as returned by a describe query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeRecord {
    /// Provider identifier of the volume.
    pub volume_id: String,
    /// Overall volume status.
    pub status: VolumeStatus,
    /// Attachment entries reported for the volume.
    pub attachments: Vec<AttachmentRecord>,
}

/// An instance as returned by a describe query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceRecord {
    /// Provider identifier of the instance.
    pub instance_id: String,
    /// Power state.
    pub state: InstanceState,
}

/// Group of instances returned together by a describe query.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reservation {
    /// Instances in this reservation.
    pub instances: Vec<InstanceRecord>,
}
