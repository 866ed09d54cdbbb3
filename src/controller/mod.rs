//! Convergence loops for volume group snapshots
//!
//! Two controllers form a pipeline connected only through cluster state:
//!
//! - [`group_snapshot`] turns a VolumeGroupSnapshot into exactly one
//!   VolumeGroupSnapshotContent and copies its readiness back up.
//! - [`snapshot_content`] turns a VolumeGroupSnapshotContent into one
//!   VolumeSnapshot per claim and aggregates their readiness.
//!
//! Each loop has a core `converge_*` function that returns an [`Outcome`] and
//! a kube-facing `reconcile`/`error_policy` pair that maps outcomes and errors
//! onto requeue [`Action`]s through the shared [`RequeueTracker`].

pub mod group_snapshot;
mod requeue;
pub mod snapshot_content;

use std::sync::Arc;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::Client;

pub use requeue::{backoff_delay, RequeueConfig, RequeueTracker};

use crate::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
use crate::store::{KubeStore, SnapshotStore};
use crate::CONTROLLER_NAME;

/// Result of one convergence pass that didn't fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal: nothing left to do until the object changes
    Done,
    /// A mutation was persisted; re-check soon
    Progressed,
    /// Blocked on something outside this controller; poll with backoff
    Waiting,
}

/// Shared state for both controllers
pub struct Context {
    /// Resource store
    pub store: Arc<dyn SnapshotStore>,
    /// Kubernetes event sink
    pub events: Arc<dyn EventPublisher>,
    /// Per-object requeue counters
    pub requeue: RequeueTracker,
}

impl Context {
    /// Create a context from explicit parts
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        events: Arc<dyn EventPublisher>,
        requeue: RequeueConfig,
    ) -> Self {
        Self {
            store,
            events,
            requeue: RequeueTracker::new(requeue),
        }
    }

    /// Create a production context talking to the API server
    pub fn from_client(client: Client, requeue: RequeueConfig) -> Self {
        Self::new(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            requeue,
        )
    }

    /// Create a context for tests: no events, no jitter
    pub fn for_testing(store: Arc<dyn SnapshotStore>) -> Self {
        Self::new(
            store,
            Arc::new(NoopEventPublisher),
            RequeueConfig {
                jitter: false,
                ..Default::default()
            },
        )
    }

    /// Map a successful pass onto a requeue action
    pub fn action_for(&self, key: &str, outcome: Outcome) -> Action {
        self.requeue.on_outcome(key, outcome)
    }

    pub(crate) async fn publish(
        &self,
        reference: ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        self.events
            .publish(&reference, type_, reason, action, Some(note))
            .await;
    }
}

/// Requeue key for an object; kinds never share counters
pub fn object_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}
