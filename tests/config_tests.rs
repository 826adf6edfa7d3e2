//! Integration tests for configuration wiring.

use std::time::Duration;

use mooring::{ConfigError, ReconcileConfig, ScalewayClient, ScalewayConfig};
use rstest::*;

#[fixture]
fn scaleway_config() -> ScalewayConfig {
    ScalewayConfig {
        secret_key: String::from("SCWSECRETKEYEXAMPLE"),
        default_zone: String::from("fr-par-2"),
        default_project_id: Some(String::from("11111111-2222-3333-4444-555555555555")),
    }
}

#[rstest]
fn client_is_scoped_to_the_configured_zone(scaleway_config: ScalewayConfig) {
    let client = ScalewayClient::new(&scaleway_config).expect("client should build");
    assert_eq!(client.zone(), "fr-par-2");
}

#[rstest]
fn client_refuses_blank_secret_with_actionable_error(scaleway_config: ScalewayConfig) {
    let config = ScalewayConfig {
        secret_key: String::new(),
        ..scaleway_config
    };

    let error = ScalewayClient::new(&config).expect_err("secret is required");

    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField, got {error:?}");
    };
    assert!(message.contains("SCW_SECRET_KEY"));
    assert!(message.contains("mooring.toml"));
}

#[test]
fn custom_timings_flow_into_the_policy() {
    let config = ReconcileConfig {
        attach_timeout_secs: 60,
        detach_timeout_secs: 90,
        stop_timeout_secs: 120,
        initial_delay_secs: 0,
        min_poll_interval_secs: 1,
        max_poll_interval_secs: 4,
        detach_confirmations: 2,
        state_file: String::from("state/attachments.toml"),
    };

    let policy = config.policy().expect("policy should build");

    assert_eq!(policy.attach_timeout, Duration::from_secs(60));
    assert_eq!(policy.detach_timeout, Duration::from_secs(90));
    assert_eq!(policy.stop_timeout, Duration::from_secs(120));
    assert_eq!(policy.initial_delay, Duration::ZERO);
    assert_eq!(policy.max_poll_interval, Duration::from_secs(4));
    assert_eq!(policy.detach_confirmations, 2);
}
