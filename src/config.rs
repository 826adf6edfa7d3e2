//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `mooring.toml`, and environment variables. The CLI
//! owns its own flags, so loading never parses the process arguments.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::reconciler::ReconcilePolicy;

const APP_NAME: &str = "mooring";

/// Scaleway credentials and scoping derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SCW",
    discovery(
        app_name = "mooring",
        env_var = "MOORING_CONFIG_PATH",
        config_file_name = "mooring.toml",
        dotfile_name = ".mooring.toml",
        project_file_name = "mooring.toml"
    )
)]
pub struct ScalewayConfig {
    /// Secret key used for authentication. This value is required.
    pub secret_key: String,
    /// Zone holding both the volumes and the instances. Defaults to
    /// `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub default_zone: String,
    /// Project identifier, recorded for diagnostics only.
    pub default_project_id: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in mooring.toml",
            self.description, self.env_var, self.toml_key, self.section
        ))
    }
}

impl ScalewayConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.trim().is_empty() {
            return Err(FieldMetadata::new(
                "Scaleway API secret key",
                "SCW_SECRET_KEY",
                "secret_key",
                "scaleway",
            )
            .missing());
        }
        if self.default_zone.trim().is_empty() {
            return Err(FieldMetadata::new(
                "availability zone",
                "SCW_DEFAULT_ZONE",
                "default_zone",
                "scaleway",
            )
            .missing());
        }
        Ok(())
    }
}

/// Wait timings and ledger location for the reconciler.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MOORING",
    discovery(
        app_name = "mooring",
        env_var = "MOORING_CONFIG_PATH",
        config_file_name = "mooring.toml",
        dotfile_name = ".mooring.toml",
        project_file_name = "mooring.toml"
    )
)]
pub struct ReconcileConfig {
    /// Seconds to wait for a volume to become attached.
    #[ortho_config(default = 300)]
    pub attach_timeout_secs: u64,
    /// Seconds to wait for a volume to become detached.
    #[ortho_config(default = 300)]
    pub detach_timeout_secs: u64,
    /// Seconds to wait for the owning instance to stop before detaching.
    #[ortho_config(default = 600)]
    pub stop_timeout_secs: u64,
    /// Seconds to pause before the first probe of every wait.
    #[ortho_config(default = 10)]
    pub initial_delay_secs: u64,
    /// Shortest pause between probes, in seconds.
    #[ortho_config(default = 3)]
    pub min_poll_interval_secs: u64,
    /// Longest pause between probes once backoff has grown, in seconds.
    #[ortho_config(default = 10)]
    pub max_poll_interval_secs: u64,
    /// Consecutive `detached` observations required to finish a detach.
    #[ortho_config(default = 1)]
    pub detach_confirmations: u32,
    /// File recording tracked attachments.
    #[ortho_config(default = "mooring-state.toml".to_owned())]
    pub state_file: String,
}

impl ReconcileConfig {
    /// Loads reconciler configuration without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates timings and the ledger location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a timeout or the confirmation
    /// count is zero, when the poll interval bounds are inverted, or when the
    /// state file is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("attach_timeout_secs", self.attach_timeout_secs),
            ("detach_timeout_secs", self.detach_timeout_secs),
            ("stop_timeout_secs", self.stop_timeout_secs),
            ("min_poll_interval_secs", self.min_poll_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be positive")));
            }
        }
        if self.detach_confirmations == 0 {
            return Err(ConfigError::Invalid(String::from(
                "detach_confirmations must be at least 1",
            )));
        }
        if self.max_poll_interval_secs < self.min_poll_interval_secs {
            return Err(ConfigError::Invalid(format!(
                "max_poll_interval_secs ({}) is below min_poll_interval_secs ({})",
                self.max_poll_interval_secs, self.min_poll_interval_secs
            )));
        }
        if self.state_file.trim().is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "state_file must not be empty",
            )));
        }
        Ok(())
    }

    /// Builds the wait policy applied by the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when validation fails.
    pub fn policy(&self) -> Result<ReconcilePolicy, ConfigError> {
        self.validate()?;
        Ok(ReconcilePolicy {
            attach_timeout: Duration::from_secs(self.attach_timeout_secs),
            detach_timeout: Duration::from_secs(self.detach_timeout_secs),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            min_poll_interval: Duration::from_secs(self.min_poll_interval_secs),
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
            detach_confirmations: self.detach_confirmations,
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
