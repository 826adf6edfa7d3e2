//! Desired-state input for a single volume attachment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters naming the attachment to reconcile.
///
/// The device, instance, and volume fields are immutable for the life of the
/// attachment: changing any of them describes a different relationship.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AttachmentRequest {
    /// Device name under which the volume is exposed (for example `/dev/sdh`).
    pub device_name: String,
    /// Provider identifier of the instance receiving the volume.
    pub instance_id: String,
    /// Provider identifier of the volume.
    pub volume_id: String,
    /// Asks the provider to detach even when it reports the volume busy.
    #[serde(default)]
    pub force_detach: bool,
    /// Drops the attachment from tracking on delete without detaching it.
    #[serde(default)]
    pub skip_destroy: bool,
}

impl AttachmentRequest {
    /// Starts a builder for an [`AttachmentRequest`].
    #[must_use]
    pub fn builder() -> AttachmentRequestBuilder {
        AttachmentRequestBuilder::new()
    }

    /// Validates the request, returning the first missing field.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any identifier is empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.device_name.trim().is_empty() {
            return Err(RequestError::Validation(String::from("device_name")));
        }
        if self.instance_id.trim().is_empty() {
            return Err(RequestError::Validation(String::from("instance_id")));
        }
        if self.volume_id.trim().is_empty() {
            return Err(RequestError::Validation(String::from("volume_id")));
        }
        Ok(())
    }
}

/// Builder for [`AttachmentRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttachmentRequestBuilder {
    device_name: String,
    instance_id: String,
    volume_id: String,
    force_detach: bool,
    skip_destroy: bool,
}

impl AttachmentRequestBuilder {
    /// Creates an empty builder; identifiers must be set before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the device name.
    #[must_use]
    pub fn device_name(mut self, value: impl Into<String>) -> Self {
        self.device_name = value.into();
        self
    }

    /// Sets the instance identifier.
    #[must_use]
    pub fn instance_id(mut self, value: impl Into<String>) -> Self {
        self.instance_id = value.into();
        self
    }

    /// Sets the volume identifier.
    #[must_use]
    pub fn volume_id(mut self, value: impl Into<String>) -> Self {
        self.volume_id = value.into();
        self
    }

    /// Sets the force-detach flag.
    #[must_use]
    pub const fn force_detach(mut self, value: bool) -> Self {
        self.force_detach = value;
        self
    }

    /// Sets the skip-destroy flag.
    #[must_use]
    pub const fn skip_destroy(mut self, value: bool) -> Self {
        self.skip_destroy = value;
        self
    }

    /// Builds and validates the [`AttachmentRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any identifier is empty.
    pub fn build(self) -> Result<AttachmentRequest, RequestError> {
        let request = AttachmentRequest {
            device_name: self.device_name.trim().to_owned(),
            instance_id: self.instance_id.trim().to_owned(),
            volume_id: self.volume_id.trim().to_owned(),
            force_detach: self.force_detach,
            skip_destroy: self.skip_destroy,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Errors raised while building a request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a required identifier is missing or blank.
    #[error("missing or empty field: {0}")]
    Validation(String),
}
