//! Wire shapes for the Scaleway Instance and Block Storage endpoints.

use serde::{Deserialize, Serialize};

use crate::cloud::{AttachmentRecord, AttachmentState, InstanceState, VolumeRecord, VolumeStatus};

/// Volume type accepted by `attach-volume` for Block Storage volumes.
const SBS_VOLUME_TYPE: &str = "sbs_volume";

/// Product resource type Block Storage reports for instance attachments.
const INSTANCE_RESOURCE_TYPE: &str = "instance_server";

/// Request body for `POST /servers/{id}/attach-volume`.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct AttachVolumeBody<'a> {
    pub volume_id: &'a str,
    pub volume_type: &'static str,
}

impl<'a> AttachVolumeBody<'a> {
    pub(crate) const fn sbs(volume_id: &'a str) -> Self {
        Self {
            volume_id,
            volume_type: SBS_VOLUME_TYPE,
        }
    }
}

/// Request body for `POST /servers/{id}/detach-volume`.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct DetachVolumeBody<'a> {
    pub volume_id: &'a str,
}

/// Error document returned with non-2xx responses.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Block Storage volume as returned by `GET /volumes/{id}`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct BlockVolume {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub references: Vec<VolumeReference>,
}

/// One consumer of a Block Storage volume.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VolumeReference {
    #[serde(default)]
    pub product_resource_type: Option<String>,
    pub product_resource_id: String,
    pub status: String,
}

impl BlockVolume {
    /// Keeps only the references held by `instance_id`; `None` when there are
    /// none.
    pub(crate) fn into_record(self, instance_id: &str) -> Option<VolumeRecord> {
        let attachments: Vec<AttachmentRecord> = self
            .references
            .into_iter()
            .filter(|reference| reference.product_resource_id == instance_id)
            .filter(|reference| {
                reference
                    .product_resource_type
                    .as_deref()
                    .is_none_or(|kind| kind == INSTANCE_RESOURCE_TYPE)
            })
            .map(|reference| AttachmentRecord {
                instance_id: Some(reference.product_resource_id),
                device_name: None,
                state: attachment_state(&reference.status),
            })
            .collect();

        if attachments.is_empty() {
            return None;
        }
        Some(VolumeRecord {
            volume_id: self.id,
            status: VolumeStatus::from(self.status.as_str()),
            attachments,
        })
    }
}

/// Maps a Block Storage reference status onto an attachment state.
pub(crate) fn attachment_state(raw: &str) -> AttachmentState {
    match raw {
        "creating" => AttachmentState::Attaching,
        "error" => AttachmentState::Failed,
        other => AttachmentState::from(other),
    }
}

/// Maps a Scaleway server state onto an instance state.
pub(crate) fn instance_state(raw: &str) -> InstanceState {
    match raw {
        "stopped in place" => InstanceState::Stopped,
        "starting" => InstanceState::Pending,
        other => InstanceState::from(other),
    }
}
