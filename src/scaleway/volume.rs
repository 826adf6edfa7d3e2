//! Direct HTTP calls for volume attachment and Block Storage lookups.

use reqwest::{RequestBuilder, Response};

use crate::cloud::ApiError;

use super::ScalewayClient;
use super::error::classify_response;
use super::types::{AttachVolumeBody, BlockVolume, DetachVolumeBody};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum VolumeAction {
    Attach,
    Detach,
}

impl VolumeAction {
    const fn path(self) -> &'static str {
        match self {
            Self::Attach => "attach-volume",
            Self::Detach => "detach-volume",
        }
    }
}

impl ScalewayClient {
    fn server_action_url(&self, instance_id: &str, action: VolumeAction) -> String {
        format!(
            "{}/instance/v1/zones/{}/servers/{}/{}",
            self.base_url,
            self.zone,
            instance_id,
            action.path()
        )
    }

    fn block_volume_url(&self, volume_id: &str) -> String {
        format!(
            "{}/block/v1alpha1/zones/{}/volumes/{}",
            self.base_url, self.zone, volume_id
        )
    }

    /// Sends an attach or detach command for `volume_id`.
    pub(super) async fn post_volume_action(
        &self,
        instance_id: &str,
        action: VolumeAction,
        volume_id: &str,
    ) -> Result<(), ApiError> {
        let url = self.server_action_url(instance_id, action);
        let request = self.http.post(&url);
        let request = match action {
            VolumeAction::Attach => request.json(&AttachVolumeBody::sbs(volume_id)),
            VolumeAction::Detach => request.json(&DetachVolumeBody { volume_id }),
        };
        self.send(request).await.map(drop)
    }

    /// Fetches a Block Storage volume by identifier.
    pub(super) async fn fetch_block_volume(&self, volume_id: &str) -> Result<BlockVolume, ApiError> {
        let url = self.block_volume_url(volume_id);
        let response = self.send(self.http.get(&url)).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::other(format!("failed to decode volume {volume_id}: {err}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header("X-Auth-Token", &self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(classify_response(status, &body))
    }
}
