//! Stable identity for a volume attachment relationship.
//!
//! The identity is an opaque existence marker: it records that a device,
//! instance, and volume triple has been attached, and nothing else. It is
//! derived with CRC-32 so the same triple always yields the same token
//! across process restarts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::AttachmentRequest;

const IDENTITY_PREFIX: &str = "vai-";

/// Opaque token recording that an attachment relationship is established.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttachmentIdentity(String);

impl AttachmentIdentity {
    /// Derives the identity for a device, instance, and volume triple.
    ///
    /// Each field is followed by a `-` separator, in that fixed order, before
    /// hashing. Reordering the inputs therefore changes the identity.
    #[must_use]
    pub fn derive(device_name: &str, instance_id: &str, volume_id: &str) -> Self {
        let key = format!("{device_name}-{instance_id}-{volume_id}-");
        Self(format!("{IDENTITY_PREFIX}{}", crc32fast::hash(key.as_bytes())))
    }

    /// Derives the identity for the triple named by `request`.
    #[must_use]
    pub fn for_request(request: &AttachmentRequest) -> Self {
        Self::derive(
            &request.device_name,
            &request.instance_id,
            &request.volume_id,
        )
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AttachmentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised when a persisted identity token cannot be accepted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IdentityError {
    /// Raised when the token is not `vai-` followed by a decimal hash.
    #[error("malformed attachment identity '{0}'")]
    Malformed(String),
}

impl FromStr for AttachmentIdentity {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix(IDENTITY_PREFIX)
            .filter(|rest| !rest.is_empty() && rest.bytes().all(|byte| byte.is_ascii_digit()))
            .ok_or_else(|| IdentityError::Malformed(value.to_owned()))?;
        digits
            .parse::<u32>()
            .map_err(|_| IdentityError::Malformed(value.to_owned()))?;
        Ok(Self(trimmed.to_owned()))
    }
}

impl TryFrom<String> for AttachmentIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttachmentIdentity> for String {
    fn from(value: AttachmentIdentity) -> Self {
        value.0
    }
}
