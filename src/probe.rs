//! Point-in-time state queries used inside wait loops.
//!
//! Absence is folded into a state here rather than surfaced as an error: a
//! volume with no matching attachment record is `detached`, and an instance
//! the control plane does not know is [`InstanceState::Absent`].

use tracing::debug;

use crate::cloud::{ApiError, AttachmentState, CloudApi, InstanceState, VolumeRecord};

/// Reports the attachment state of `volume_id` on `instance_id`.
///
/// A missing volume, or a volume without an attachment record for the
/// instance, reads as [`AttachmentState::Detached`]: the platform signals a
/// completed detach by dropping the record.
///
/// # Errors
///
/// Returns the client's [`ApiError`] for any failure other than not-found.
pub async fn probe_volume_attachment<C>(
    api: &C,
    volume_id: &str,
    instance_id: &str,
) -> Result<AttachmentState, ApiError>
where
    C: CloudApi + ?Sized,
{
    let Some(volume) = lookup_attachment(api, volume_id, instance_id).await? else {
        return Ok(AttachmentState::Detached);
    };
    Ok(attachment_state_for(&volume, instance_id))
}

/// Reports the power state of `instance_id`.
///
/// An instance the control plane does not know reads as
/// [`InstanceState::Absent`], so a caller waiting for shutdown has nothing
/// left to wait on.
///
/// # Errors
///
/// Returns the client's [`ApiError`] for any failure other than not-found.
pub async fn probe_instance_state<C>(api: &C, instance_id: &str) -> Result<InstanceState, ApiError>
where
    C: CloudApi + ?Sized,
{
    let reservations = match api.describe_instances(instance_id).await {
        Ok(reservations) => reservations,
        Err(err) if err.is_not_found() => {
            debug!(instance_id, "instance not found");
            return Ok(InstanceState::Absent);
        }
        Err(err) => return Err(err),
    };

    Ok(reservations
        .into_iter()
        .next()
        .and_then(|reservation| reservation.instances.into_iter().next())
        .map_or(InstanceState::Absent, |instance| instance.state))
}

/// Looks up the volume record carrying an attachment to `instance_id`.
///
/// Returns `None` when the volume is unknown or holds no attachment for the
/// instance.
///
/// # Errors
///
/// Returns the client's [`ApiError`] for any failure other than not-found.
pub async fn lookup_attachment<C>(
    api: &C,
    volume_id: &str,
    instance_id: &str,
) -> Result<Option<VolumeRecord>, ApiError>
where
    C: CloudApi + ?Sized,
{
    match api.describe_volumes(volume_id, instance_id).await {
        Ok(volumes) => Ok(volumes.into_iter().next()),
        Err(err) if err.is_not_found() => {
            debug!(volume_id, instance_id, "volume not found");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn attachment_state_for(volume: &VolumeRecord, instance_id: &str) -> AttachmentState {
    volume
        .attachments
        .iter()
        .find(|attachment| attachment.instance_id.as_deref() == Some(instance_id))
        .map_or(AttachmentState::Detached, |attachment| {
            attachment.state.clone()
        })
}
