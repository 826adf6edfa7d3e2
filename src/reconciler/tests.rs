//! Scenario tests for the attachment reconciler.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::cloud::{ApiError, AttachmentRecord, AttachmentState, InstanceState, VolumeRecord};
use crate::test_support::{CloudCall, ScriptedCloud};

const DEVICE: &str = "/dev/sdh";
const INSTANCE: &str = "i-123";
const VOLUME: &str = "vol-abc";

fn request() -> AttachmentRequest {
    AttachmentRequest::builder()
        .device_name(DEVICE)
        .instance_id(INSTANCE)
        .volume_id(VOLUME)
        .build()
        .unwrap_or_else(|err| panic!("request should build: {err}"))
}

fn identity() -> AttachmentIdentity {
    AttachmentIdentity::for_request(&request())
}

fn reconciler(cloud: &ScriptedCloud) -> AttachmentReconciler<ScriptedCloud> {
    AttachmentReconciler::new(cloud.clone(), ReconcilePolicy::default())
}

fn push_attachment(cloud: &ScriptedCloud, status: VolumeStatus, state: AttachmentState) {
    cloud.push_attachment_state(VOLUME, INSTANCE, status, state);
}

fn is_detach(call: &CloudCall) -> bool {
    matches!(call, CloudCall::DetachVolume(_))
}

fn is_describe_volumes(call: &CloudCall) -> bool {
    matches!(call, CloudCall::DescribeVolumes { .. })
}

fn is_describe_instances(call: &CloudCall) -> bool {
    matches!(call, CloudCall::DescribeInstances(_))
}

#[tokio::test(start_paused = true)]
async fn create_returns_identity_once_attachment_converges() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attaching);
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attaching);
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attached);
    let started = Instant::now();

    let identity = reconciler(&cloud)
        .create(&request(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(identity.as_str(), "vai-2383846391");
    assert_eq!(
        cloud.calls().first(),
        Some(&CloudCall::AttachVolume(AttachVolumeInput::from(&request())))
    );
    // Three probes while waiting plus the follow-up read.
    assert_eq!(cloud.count_calls(is_describe_volumes), 4);
    let policy = ReconcilePolicy::default();
    assert!(started.elapsed() >= policy.initial_delay + policy.min_poll_interval * 2);
}

#[tokio::test(start_paused = true)]
async fn create_surfaces_rejected_attach_without_polling() {
    let cloud = ScriptedCloud::new();
    let rejection = ApiError::api("IncorrectState", "vol-abc is not available");
    cloud.push_attach(Err(rejection.clone()));

    let err = reconciler(&cloud)
        .create(&request(), &CancellationToken::new())
        .await
        .expect_err("rejected attach should fail");

    assert_eq!(
        err,
        ReconcileError::CommandRejected {
            command: Command::AttachVolume,
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
            source: rejection,
        }
    );
    assert_eq!(cloud.count_calls(is_describe_volumes), 0);
}

#[tokio::test(start_paused = true)]
async fn create_times_out_when_attachment_stays_pending() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attaching);
    let started = Instant::now();

    let err = reconciler(&cloud)
        .create(&request(), &CancellationToken::new())
        .await
        .expect_err("attach should time out");

    assert_eq!(
        err,
        ReconcileError::PollTimeout {
            phase: Phase::Attach,
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
            timeout: Duration::from_secs(300),
            last_state: String::from("attaching"),
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn create_fails_fast_on_failed_attachment() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attaching);
    push_attachment(&cloud, VolumeStatus::Other(String::from("error")), AttachmentState::Failed);

    let err = reconciler(&cloud)
        .create(&request(), &CancellationToken::new())
        .await
        .expect_err("failed attachment should stop the wait");

    let ReconcileError::UnexpectedState { phase, state, .. } = err else {
        panic!("expected UnexpectedState, got {err:?}");
    };
    assert_eq!(phase, Phase::Attach);
    assert_eq!(state, "failed");
    assert_eq!(cloud.count_calls(is_describe_volumes), 2);
}

#[tokio::test(start_paused = true)]
async fn create_rejects_incomplete_requests_before_any_call() {
    let cloud = ScriptedCloud::new();
    let incomplete = AttachmentRequest {
        volume_id: String::new(),
        ..request()
    };

    let err = reconciler(&cloud)
        .create(&incomplete, &CancellationToken::new())
        .await
        .expect_err("missing volume should be rejected");

    assert_eq!(
        err,
        ReconcileError::Validation(crate::request::RequestError::Validation(String::from(
            "volume_id"
        )))
    );
    assert!(cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn create_fails_when_read_no_longer_sees_the_attachment() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attached);
    push_attachment(&cloud, VolumeStatus::Available, AttachmentState::Attached);

    let err = reconciler(&cloud)
        .create(&request(), &CancellationToken::new())
        .await
        .expect_err("vanished attachment should fail create");

    assert_eq!(
        err,
        ReconcileError::NotObservedAfterAttach {
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
        }
    );
}

#[tokio::test]
async fn read_keeps_tracking_an_attached_volume() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Attached);

    let exists = reconciler(&cloud)
        .read(&identity(), &request())
        .await
        .unwrap_or_else(|err| panic!("read should succeed: {err}"));

    assert!(exists);
}

#[tokio::test]
async fn read_drops_tracking_for_available_volume_every_time() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::Available, AttachmentState::Detached);
    let reconciler = reconciler(&cloud);

    for _ in 0..3 {
        let exists = reconciler
            .read(&identity(), &request())
            .await
            .unwrap_or_else(|err| panic!("read should succeed: {err}"));
        assert!(!exists);
    }
}

#[tokio::test]
async fn read_drops_tracking_for_missing_volume() {
    let cloud = ScriptedCloud::new();
    cloud.push_volumes(Ok(Vec::new()));
    cloud.push_volumes(Err(ApiError::api("InvalidVolume.NotFound", "no such volume")));
    let reconciler = reconciler(&cloud);

    for _ in 0..2 {
        let exists = reconciler
            .read(&identity(), &request())
            .await
            .unwrap_or_else(|err| panic!("read should succeed: {err}"));
        assert!(!exists);
    }
}

#[tokio::test]
async fn read_surfaces_query_failures() {
    let cloud = ScriptedCloud::new();
    cloud.push_volumes(Err(ApiError::other("connection reset")));

    let err = reconciler(&cloud)
        .read(&identity(), &request())
        .await
        .expect_err("query failure should surface");

    assert_eq!(
        err,
        ReconcileError::Probe {
            phase: Phase::Read,
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
            source: ApiError::other("connection reset"),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn delete_with_skip_destroy_never_contacts_the_control_plane() {
    let cloud = ScriptedCloud::new();
    let skipped = AttachmentRequest {
        skip_destroy: true,
        ..request()
    };

    reconciler(&cloud)
        .delete(&identity(), &skipped, &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("skipped delete should succeed: {err}"));

    assert!(cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delete_stops_the_instance_before_detaching() {
    let cloud = ScriptedCloud::new();
    cloud.push_instance_state(INSTANCE, InstanceState::Stopping);
    cloud.push_instance_state(INSTANCE, InstanceState::Stopped);
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Detaching);
    cloud.push_volumes(Ok(Vec::new()));
    let forced = AttachmentRequest {
        force_detach: true,
        ..request()
    };

    reconciler(&cloud)
        .delete(&identity(), &forced, &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("delete should succeed: {err}"));

    let calls = cloud.calls();
    let stop_at = calls
        .iter()
        .position(|call| matches!(call, CloudCall::StopInstance(_)))
        .unwrap_or_else(|| panic!("stop should be issued: {calls:?}"));
    let detach_at = calls
        .iter()
        .position(is_detach)
        .unwrap_or_else(|| panic!("detach should be issued: {calls:?}"));
    let last_instance_probe = calls
        .iter()
        .rposition(is_describe_instances)
        .unwrap_or_else(|| panic!("stop should be awaited: {calls:?}"));
    assert!(stop_at < last_instance_probe && last_instance_probe < detach_at);
    assert_eq!(
        calls.get(detach_at),
        Some(&CloudCall::DetachVolume(DetachVolumeInput::from(&forced)))
    );
}

#[tokio::test(start_paused = true)]
async fn delete_detaches_even_when_stop_is_refused() {
    let cloud = ScriptedCloud::new();
    cloud.push_stop(Err(ApiError::api(
        "UnsupportedOperation",
        "instance does not support stopping",
    )));
    cloud.push_volumes(Ok(Vec::new()));

    reconciler(&cloud)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("delete should succeed: {err}"));

    assert_eq!(cloud.count_calls(is_detach), 1);
    assert_eq!(cloud.count_calls(is_describe_instances), 0);
}

#[tokio::test(start_paused = true)]
async fn delete_aborts_when_instance_never_stops() {
    let cloud = ScriptedCloud::new();
    cloud.push_instance_state(INSTANCE, InstanceState::Stopping);
    let started = Instant::now();

    let err = reconciler(&cloud)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .expect_err("stuck stop should abort delete");

    assert_eq!(
        err,
        ReconcileError::StopTimeout {
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
            timeout: Duration::from_secs(600),
            last_state: String::from("stopping"),
        }
    );
    assert_eq!(cloud.count_calls(is_detach), 0);
    assert!(started.elapsed() >= Duration::from_secs(600));
}

#[tokio::test(start_paused = true)]
async fn delete_aborts_when_instance_reports_running_after_stop() {
    let cloud = ScriptedCloud::new();
    cloud.push_instance_state(INSTANCE, InstanceState::Running);

    let err = reconciler(&cloud)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .expect_err("running instance should abort delete");

    let ReconcileError::UnexpectedState { phase, state, .. } = err else {
        panic!("expected UnexpectedState, got {err:?}");
    };
    assert_eq!(phase, Phase::Stop);
    assert_eq!(state, "running");
    assert_eq!(cloud.count_calls(is_detach), 0);
}

#[tokio::test(start_paused = true)]
async fn delete_treats_missing_instance_as_stopped() {
    let cloud = ScriptedCloud::new();
    cloud.push_instances(Err(ApiError::api(
        "InvalidInstanceID.NotFound",
        "the instance ID 'i-123' does not exist",
    )));
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Detaching);
    cloud.push_volumes(Ok(Vec::new()));

    reconciler(&cloud)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("delete should succeed: {err}"));

    assert_eq!(cloud.count_calls(is_describe_instances), 1);
    assert_eq!(cloud.count_calls(is_detach), 1);
    assert_eq!(cloud.count_calls(is_describe_volumes), 2);
}

#[tokio::test(start_paused = true)]
async fn delete_surfaces_rejected_detach() {
    let cloud = ScriptedCloud::new();
    let rejection = ApiError::api("IncorrectState", "volume is busy");
    cloud.push_detach(Err(rejection.clone()));

    let err = reconciler(&cloud)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .expect_err("rejected detach should fail");

    assert_eq!(
        err,
        ReconcileError::CommandRejected {
            command: Command::DetachVolume,
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
            source: rejection,
        }
    );
    assert_eq!(cloud.count_calls(is_describe_volumes), 0);
}

#[tokio::test(start_paused = true)]
async fn delete_times_out_when_detach_stays_pending() {
    let cloud = ScriptedCloud::new();
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Detaching);

    let err = reconciler(&cloud)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .expect_err("detach should time out");

    let ReconcileError::PollTimeout {
        phase, last_state, ..
    } = err
    else {
        panic!("expected PollTimeout, got {err:?}");
    };
    assert_eq!(phase, Phase::Detach);
    assert_eq!(last_state, "detaching");
}

#[tokio::test(start_paused = true)]
async fn delete_requires_configured_detach_confirmations() {
    let cloud = ScriptedCloud::new();
    cloud.push_volumes(Ok(Vec::new()));
    push_attachment(&cloud, VolumeStatus::InUse, AttachmentState::Detaching);
    cloud.push_volumes(Ok(Vec::new()));
    let policy = ReconcilePolicy {
        detach_confirmations: 2,
        ..ReconcilePolicy::default()
    };

    AttachmentReconciler::new(cloud.clone(), policy)
        .delete(&identity(), &request(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("delete should succeed: {err}"));

    // detached, detaching, detached, detached
    assert_eq!(cloud.count_calls(is_describe_volumes), 4);
}

#[tokio::test(start_paused = true)]
async fn cancelling_delete_stops_waiting_but_keeps_issued_commands() {
    let cloud = ScriptedCloud::new();
    cloud.push_instance_state(INSTANCE, InstanceState::Stopping);
    let token = CancellationToken::new();
    token.cancel();

    let err = reconciler(&cloud)
        .delete(&identity(), &request(), &token)
        .await
        .expect_err("cancelled delete should fail");

    assert_eq!(
        err,
        ReconcileError::Cancelled {
            phase: Phase::Stop,
            volume_id: String::from(VOLUME),
            instance_id: String::from(INSTANCE),
        }
    );
    assert_eq!(
        cloud.calls(),
        vec![CloudCall::StopInstance(String::from(INSTANCE))]
    );
}

#[tokio::test(start_paused = true)]
async fn independent_pairs_reconcile_concurrently_on_a_shared_client() {
    let cloud = ScriptedCloud::new();
    cloud.push_volumes(Ok(vec![VolumeRecord {
        volume_id: String::from(VOLUME),
        status: VolumeStatus::InUse,
        attachments: ["i-1", "i-2"]
            .into_iter()
            .map(|instance_id| AttachmentRecord {
                instance_id: Some(instance_id.to_owned()),
                device_name: None,
                state: AttachmentState::Attached,
            })
            .collect(),
    }]));
    let reconciler = AttachmentReconciler::new(Arc::new(cloud.clone()), ReconcilePolicy::default());
    let first = AttachmentRequest {
        instance_id: String::from("i-1"),
        ..request()
    };
    let second = AttachmentRequest {
        instance_id: String::from("i-2"),
        ..request()
    };
    let token = CancellationToken::new();

    let (first_identity, second_identity) = tokio::join!(
        reconciler.create(&first, &token),
        reconciler.create(&second, &token)
    );

    let first_identity =
        first_identity.unwrap_or_else(|err| panic!("first create should succeed: {err}"));
    let second_identity =
        second_identity.unwrap_or_else(|err| panic!("second create should succeed: {err}"));
    assert_ne!(first_identity, second_identity);
    assert_eq!(
        cloud.count_calls(|call| matches!(call, CloudCall::AttachVolume(_))),
        2
    );
}
