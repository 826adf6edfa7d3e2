//! Attachment reconciliation: create, read, and delete a volume attachment.
//!
//! The reconciler issues one mutating command at a time and then waits for
//! the control plane to converge. Identities are handed back to the caller
//! rather than stored: a successful [`AttachmentReconciler::create`] returns
//! the identity to record, and a successful [`AttachmentReconciler::delete`]
//! means the caller must drop it.

mod error;
mod policy;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cloud::{AttachVolumeInput, CloudApi, DetachVolumeInput, VolumeStatus};
use crate::identity::AttachmentIdentity;
use crate::probe::{lookup_attachment, probe_instance_state, probe_volume_attachment};
use crate::request::AttachmentRequest;

pub use error::{Command, Phase, ReconcileError};
pub use policy::ReconcilePolicy;

/// Drives a volume attachment to its desired state.
///
/// The reconciler keeps no per-attachment state, so one instance can serve
/// any number of concurrent reconciliations for different volume/instance
/// pairs.
#[derive(Clone, Debug)]
pub struct AttachmentReconciler<C> {
    api: C,
    policy: ReconcilePolicy,
}

impl<C> AttachmentReconciler<C>
where
    C: CloudApi,
{
    /// Creates a reconciler issuing commands through `api`.
    #[must_use]
    pub const fn new(api: C, policy: ReconcilePolicy) -> Self {
        Self { api, policy }
    }

    /// Returns the wait policy in force.
    #[must_use]
    pub const fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Attaches the volume and waits until the control plane reports it
    /// attached, returning the identity to record.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] for incomplete requests,
    /// [`ReconcileError::CommandRejected`] when the attach command is
    /// refused, a wait failure when the attachment does not converge, and
    /// [`ReconcileError::NotObservedAfterAttach`] when the follow-up read no
    /// longer sees the attachment. No identity is produced on error.
    pub async fn create(
        &self,
        request: &AttachmentRequest,
        cancel: &CancellationToken,
    ) -> Result<AttachmentIdentity, ReconcileError> {
        request.validate()?;
        let volume_id = request.volume_id.as_str();
        let instance_id = request.instance_id.as_str();

        info!(
            volume_id,
            instance_id,
            device_name = %request.device_name,
            "attaching volume"
        );
        self.api
            .attach_volume(&AttachVolumeInput::from(request))
            .await
            .map_err(|source| {
                ReconcileError::command_rejected(Command::AttachVolume, request, source)
            })?;

        let api = &self.api;
        self.policy
            .attach_wait()
            .wait_for(
                move || probe_volume_attachment(api, volume_id, instance_id),
                cancel,
            )
            .await
            .map_err(|err| ReconcileError::from_wait(Phase::Attach, request, err))?;

        let identity = AttachmentIdentity::for_request(request);
        if !self.read(&identity, request).await? {
            return Err(ReconcileError::NotObservedAfterAttach {
                volume_id: volume_id.to_owned(),
                instance_id: instance_id.to_owned(),
            });
        }

        info!(volume_id, instance_id, %identity, "volume attached");
        Ok(identity)
    }

    /// Reports whether the recorded attachment still exists.
    ///
    /// Returns `false` when the volume is gone, holds no attachment for the
    /// instance, or is `available`; the caller should then drop `identity`.
    /// Read never changes the request fields.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Probe`] when the query fails for any reason
    /// other than not-found.
    pub async fn read(
        &self,
        identity: &AttachmentIdentity,
        request: &AttachmentRequest,
    ) -> Result<bool, ReconcileError> {
        let volume = lookup_attachment(&self.api, &request.volume_id, &request.instance_id)
            .await
            .map_err(|source| ReconcileError::probe(Phase::Read, request, source))?;

        match volume {
            Some(volume) if volume.status != VolumeStatus::Available => Ok(true),
            _ => {
                debug!(%identity, "volume attachment not found, dropping from tracking");
                Ok(false)
            }
        }
    }

    /// Detaches the volume, stopping the owning instance first.
    ///
    /// With `skip_destroy` set the control plane is not contacted at all. A
    /// refused stop command is logged and the detach goes ahead; a stop that
    /// was accepted but never completes aborts before detaching. On success
    /// the caller must drop `identity`; on error it stays recorded so the
    /// delete can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::StopTimeout`] when the instance does not
    /// stop in time, [`ReconcileError::CommandRejected`] when the detach
    /// command is refused, and a wait failure when the detach does not
    /// converge.
    pub async fn delete(
        &self,
        identity: &AttachmentIdentity,
        request: &AttachmentRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        if request.skip_destroy {
            info!(%identity, "skip_destroy set, dropping attachment without detaching");
            return Ok(());
        }
        request.validate()?;

        self.quiesce_instance(request, cancel).await?;

        let volume_id = request.volume_id.as_str();
        let instance_id = request.instance_id.as_str();
        info!(
            volume_id,
            instance_id,
            force = request.force_detach,
            "detaching volume"
        );
        self.api
            .detach_volume(&DetachVolumeInput::from(request))
            .await
            .map_err(|source| {
                ReconcileError::command_rejected(Command::DetachVolume, request, source)
            })?;

        let api = &self.api;
        self.policy
            .detach_wait()
            .wait_for(
                move || probe_volume_attachment(api, volume_id, instance_id),
                cancel,
            )
            .await
            .map_err(|err| ReconcileError::from_wait(Phase::Detach, request, err))?;

        info!(volume_id, instance_id, %identity, "volume detached");
        Ok(())
    }

    async fn quiesce_instance(
        &self,
        request: &AttachmentRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let instance_id = request.instance_id.as_str();
        if let Err(err) = self.api.stop_instance(instance_id).await {
            warn!(instance_id, error = %err, "stop command refused, detaching anyway");
            return Ok(());
        }

        debug!(instance_id, "waiting for instance to stop");
        let api = &self.api;
        self.policy
            .stop_wait()
            .wait_for(move || probe_instance_state(api, instance_id), cancel)
            .await
            .map_err(|err| ReconcileError::from_wait(Phase::Stop, request, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
