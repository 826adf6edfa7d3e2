//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cloud::{
    ApiError, ApiFuture, AttachVolumeInput, AttachmentRecord, AttachmentState, CloudApi,
    DetachVolumeInput, InstanceRecord, InstanceState, Reservation, VolumeRecord, VolumeStatus,
};

/// Records a single call made through [`ScriptedCloud`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CloudCall {
    /// An attach command.
    AttachVolume(AttachVolumeInput),
    /// A detach command.
    DetachVolume(DetachVolumeInput),
    /// A volume query.
    DescribeVolumes {
        /// Volume queried.
        volume_id: String,
        /// Instance filter applied.
        instance_id: String,
    },
    /// A stop command.
    StopInstance(String),
    /// An instance query.
    DescribeInstances(String),
}

/// Scripted control plane that replays pre-seeded responses.
///
/// Each operation has its own FIFO queue. Once a queue is down to its last
/// response, that response repeats for every further call. Empty queues
/// accept every command, report no matching volume, and report no instance.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCloud {
    state: Arc<Mutex<Script>>,
}

#[derive(Debug, Default)]
struct Script {
    attach: VecDeque<Result<(), ApiError>>,
    detach: VecDeque<Result<(), ApiError>>,
    stop: VecDeque<Result<(), ApiError>>,
    volumes: VecDeque<Result<Vec<VolumeRecord>, ApiError>>,
    instances: VecDeque<Result<Vec<Reservation>, ApiError>>,
    calls: Vec<CloudCall>,
}

fn next_response<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl ScriptedCloud {
    /// Creates a control plane with empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues the outcome of the next attach command.
    pub fn push_attach(&self, result: Result<(), ApiError>) {
        self.script().attach.push_back(result);
    }

    /// Queues the outcome of the next detach command.
    pub fn push_detach(&self, result: Result<(), ApiError>) {
        self.script().detach.push_back(result);
    }

    /// Queues the outcome of the next stop command.
    pub fn push_stop(&self, result: Result<(), ApiError>) {
        self.script().stop.push_back(result);
    }

    /// Queues the next volume query response.
    pub fn push_volumes(&self, result: Result<Vec<VolumeRecord>, ApiError>) {
        self.script().volumes.push_back(result);
    }

    /// Queues a volume query response holding one attachment in `state`.
    pub fn push_attachment_state(
        &self,
        volume_id: &str,
        instance_id: &str,
        status: VolumeStatus,
        state: AttachmentState,
    ) {
        self.push_volumes(Ok(vec![volume_record(
            volume_id,
            instance_id,
            status,
            state,
        )]));
    }

    /// Queues the next instance query response.
    pub fn push_instances(&self, result: Result<Vec<Reservation>, ApiError>) {
        self.script().instances.push_back(result);
    }

    /// Queues an instance query response reporting `state`.
    pub fn push_instance_state(&self, instance_id: &str, state: InstanceState) {
        self.push_instances(Ok(vec![reservation(instance_id, state)]));
    }

    /// Drops every queued response, keeping the call log.
    pub fn clear_responses(&self) {
        let mut script = self.script();
        script.attach.clear();
        script.detach.clear();
        script.stop.clear();
        script.volumes.clear();
        script.instances.clear();
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CloudCall> {
        self.script().calls.clone()
    }

    /// Counts recorded calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&CloudCall) -> bool) -> usize {
        self.script().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: CloudCall) {
        self.script().calls.push(call);
    }
}

impl CloudApi for ScriptedCloud {
    fn attach_volume<'a>(&'a self, input: &'a AttachVolumeInput) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record(CloudCall::AttachVolume(input.clone()));
            next_response(&mut self.script().attach).unwrap_or(Ok(()))
        })
    }

    fn detach_volume<'a>(&'a self, input: &'a DetachVolumeInput) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record(CloudCall::DetachVolume(input.clone()));
            next_response(&mut self.script().detach).unwrap_or(Ok(()))
        })
    }

    fn describe_volumes<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VolumeRecord>> {
        Box::pin(async move {
            self.record(CloudCall::DescribeVolumes {
                volume_id: volume_id.to_owned(),
                instance_id: instance_id.to_owned(),
            });
            next_response(&mut self.script().volumes).unwrap_or_else(|| Ok(Vec::new()))
        })
    }

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record(CloudCall::StopInstance(instance_id.to_owned()));
            next_response(&mut self.script().stop).unwrap_or(Ok(()))
        })
    }

    fn describe_instances<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Vec<Reservation>> {
        Box::pin(async move {
            self.record(CloudCall::DescribeInstances(instance_id.to_owned()));
            next_response(&mut self.script().instances).unwrap_or_else(|| Ok(Vec::new()))
        })
    }
}

/// Builds a volume record with a single attachment to `instance_id`.
#[must_use]
pub fn volume_record(
    volume_id: &str,
    instance_id: &str,
    status: VolumeStatus,
    state: AttachmentState,
) -> VolumeRecord {
    VolumeRecord {
        volume_id: volume_id.to_owned(),
        status,
        attachments: vec![AttachmentRecord {
            instance_id: Some(instance_id.to_owned()),
            device_name: None,
            state,
        }],
    }
}

/// Builds a reservation holding one instance in `state`.
#[must_use]
pub fn reservation(instance_id: &str, state: InstanceState) -> Reservation {
    Reservation {
        instances: vec![InstanceRecord {
            instance_id: instance_id.to_owned(),
            state,
        }],
    }
}
