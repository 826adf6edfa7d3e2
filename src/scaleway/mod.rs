//! Scaleway implementation of the control-plane client.
//!
//! Instance power actions and instance listings go through `scaleway-rs`.
//! Volume attach, detach, and Block Storage lookups are not exposed by the
//! SDK, so they use direct HTTP calls against the public API.

mod error;
mod types;
mod volume;

use std::time::Duration;

use scaleway_rs::ScalewayApi;
use tracing::debug;

use crate::cloud::{
    ApiError, ApiFuture, AttachVolumeInput, CloudApi, DetachVolumeInput, InstanceRecord,
    Reservation, VolumeRecord,
};
use crate::config::{ConfigError, ScalewayConfig};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SCALEWAY_API_BASE: &str = "https://api.scaleway.com";
const POWEROFF_ACTION: &str = "poweroff";

/// Client issuing attachment commands and queries against one Scaleway zone.
#[derive(Clone)]
pub struct ScalewayClient {
    api: ScalewayApi,
    http: reqwest::Client,
    secret_key: String,
    zone: String,
    base_url: String,
}

impl ScalewayClient {
    /// Constructs a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn new(config: &ScalewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            api: ScalewayApi::new(&config.secret_key),
            http,
            secret_key: config.secret_key.clone(),
            zone: config.default_zone.clone(),
            base_url: String::from(SCALEWAY_API_BASE),
        })
    }

    /// Returns the zone every call is scoped to.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    async fn fetch_reservations(&self, instance_id: &str) -> Result<Vec<Reservation>, ApiError> {
        let servers = self
            .api
            .list_instances(&self.zone)
            .servers(instance_id)
            .per_page(1)
            .run_async()
            .await?;

        let instances: Vec<InstanceRecord> = servers
            .into_iter()
            .filter(|server| server.id == instance_id)
            .map(|server| InstanceRecord {
                state: types::instance_state(&server.state),
                instance_id: server.id,
            })
            .collect();

        if instances.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Reservation { instances }])
    }
}

impl std::fmt::Debug for ScalewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalewayClient")
            .field("zone", &self.zone)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CloudApi for ScalewayClient {
    fn attach_volume<'a>(&'a self, input: &'a AttachVolumeInput) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            debug!(
                device_name = %input.device_name,
                "scaleway assigns device slots itself; device name only feeds the identity"
            );
            self.post_volume_action(
                &input.instance_id,
                volume::VolumeAction::Attach,
                &input.volume_id,
            )
            .await
        })
    }

    fn detach_volume<'a>(&'a self, input: &'a DetachVolumeInput) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            if input.force {
                debug!(
                    volume_id = %input.volume_id,
                    "scaleway has no forced detach; sending a regular detach"
                );
            }
            self.post_volume_action(
                &input.instance_id,
                volume::VolumeAction::Detach,
                &input.volume_id,
            )
            .await
        })
    }

    fn describe_volumes<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VolumeRecord>> {
        Box::pin(async move {
            let volume = self.fetch_block_volume(volume_id).await?;
            Ok(volume.into_record(instance_id).into_iter().collect())
        })
    }

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.api
                .perform_instance_action_async(&self.zone, instance_id, POWEROFF_ACTION)
                .await?;
            Ok(())
        })
    }

    fn describe_instances<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Vec<Reservation>> {
        Box::pin(async move { self.fetch_reservations(instance_id).await })
    }
}
