//! Control-plane client seam consumed by the reconciler.
//!
//! The reconciler never talks to a provider SDK directly. It issues commands
//! and queries through [`CloudApi`], and every failure crossing this boundary
//! has already been classified into an [`ApiError`].

mod types;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::request::AttachmentRequest;

pub use types::{
    AttachmentRecord, AttachmentState, InstanceRecord, InstanceState, Reservation, VolumeRecord,
    VolumeStatus,
};

/// Error type reported by the Scaleway API for unknown resources.
pub const NOT_FOUND_TYPE: &str = "not_found";

const NOT_FOUND_CODE_SUFFIX: &str = ".NotFound";

/// Future returned by control-plane operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Failure reported by the control plane, classified once at the client
/// boundary.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// The platform rejected the call with a recognised error code.
    #[error("{message} (code: {code})")]
    Api {
        /// Platform error code (for example `InvalidVolume.NotFound`).
        code: String,
        /// Platform error message.
        message: String,
    },
    /// Any other failure, such as a transport or decoding error.
    #[error("{message}")]
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl ApiError {
    /// Builds a platform error from its code and message.
    #[must_use]
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Builds an unclassified error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns the platform error code, if the platform supplied one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            Self::Other { .. } => None,
        }
    }

    /// Reports whether the platform says the queried resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code()
            .is_some_and(|code| code == NOT_FOUND_TYPE || code.ends_with(NOT_FOUND_CODE_SUFFIX))
    }
}

/// Arguments of an attach command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachVolumeInput {
    /// Device name requested for the volume.
    pub device_name: String,
    /// Instance receiving the volume.
    pub instance_id: String,
    /// Volume to attach.
    pub volume_id: String,
}

impl From<&AttachmentRequest> for AttachVolumeInput {
    fn from(request: &AttachmentRequest) -> Self {
        Self {
            device_name: request.device_name.clone(),
            instance_id: request.instance_id.clone(),
            volume_id: request.volume_id.clone(),
        }
    }
}

/// Arguments of a detach command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetachVolumeInput {
    /// Device name the volume was attached under.
    pub device_name: String,
    /// Instance holding the volume.
    pub instance_id: String,
    /// Volume to detach.
    pub volume_id: String,
    /// Detach even when the platform reports the volume busy.
    pub force: bool,
}

impl From<&AttachmentRequest> for DetachVolumeInput {
    fn from(request: &AttachmentRequest) -> Self {
        Self {
            device_name: request.device_name.clone(),
            instance_id: request.instance_id.clone(),
            volume_id: request.volume_id.clone(),
            force: request.force_detach,
        }
    }
}

/// Commands and queries the reconciler needs from a cloud provider.
///
/// Implementations must be safe to share between concurrent reconciliations
/// and must not retry on behalf of the caller beyond their own transport
/// policy.
pub trait CloudApi: Send + Sync {
    /// Asks the platform to attach a volume.
    fn attach_volume<'a>(&'a self, input: &'a AttachVolumeInput) -> ApiFuture<'a, ()>;

    /// Asks the platform to detach a volume.
    fn detach_volume<'a>(&'a self, input: &'a DetachVolumeInput) -> ApiFuture<'a, ()>;

    /// Describes `volume_id`, restricted to volumes holding an attachment
    /// record for `instance_id`. An empty list means no such attachment.
    fn describe_volumes<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VolumeRecord>>;

    /// Asks the platform to stop an instance.
    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()>;

    /// Describes one instance.
    fn describe_instances<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Vec<Reservation>>;
}

impl<C> CloudApi for Arc<C>
where
    C: CloudApi + ?Sized,
{
    fn attach_volume<'a>(&'a self, input: &'a AttachVolumeInput) -> ApiFuture<'a, ()> {
        (**self).attach_volume(input)
    }

    fn detach_volume<'a>(&'a self, input: &'a DetachVolumeInput) -> ApiFuture<'a, ()> {
        (**self).detach_volume(input)
    }

    fn describe_volumes<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VolumeRecord>> {
        (**self).describe_volumes(volume_id, instance_id)
    }

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()> {
        (**self).stop_instance(instance_id)
    }

    fn describe_instances<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Vec<Reservation>> {
        (**self).describe_instances(instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ApiError::api("InvalidVolume.NotFound", "gone"), true)]
    #[case(ApiError::api("InvalidInstanceID.NotFound", "gone"), true)]
    #[case(ApiError::api(NOT_FOUND_TYPE, "resource is not found"), true)]
    #[case(ApiError::api("IncorrectState", "busy"), false)]
    #[case(ApiError::other("connection reset"), false)]
    fn not_found_classification(#[case] error: ApiError, #[case] expected: bool) {
        assert_eq!(error.is_not_found(), expected);
    }

    #[rstest]
    fn api_error_display_carries_code_and_message() {
        let error = ApiError::api("IncorrectState", "volume is in use");
        assert_eq!(error.to_string(), "volume is in use (code: IncorrectState)");
    }

    #[rstest]
    fn detach_input_carries_force_flag() {
        let request = AttachmentRequest::builder()
            .device_name("/dev/sdh")
            .instance_id("i-123")
            .volume_id("vol-abc")
            .force_detach(true)
            .build()
            .unwrap_or_else(|err| panic!("request should build: {err}"));
        let input = DetachVolumeInput::from(&request);
        assert!(input.force);
        assert_eq!(input.volume_id, "vol-abc");
    }
}
