//! Custom Resource Definitions for volume group snapshots
//!
//! Three resources are owned by this crate (VolumeGroup, VolumeGroupSnapshot,
//! VolumeGroupSnapshotContent). VolumeSnapshot belongs to the CSI external
//! snapshotter and is only consumed.

mod group_snapshot;
mod selector;
mod snapshot_content;
mod types;
mod volume_group;
mod volume_snapshot;

pub use group_snapshot::{VolumeGroupSnapshot, VolumeGroupSnapshotSpec, VolumeGroupSnapshotStatus};
pub use selector::{SelectorOperator, SelectorRequirement, VolumeSelector};
pub use snapshot_content::{
    VolumeGroupSnapshotContent, VolumeGroupSnapshotContentSpec, VolumeGroupSnapshotContentStatus,
};
pub use types::{same_error, SnapshotError};
pub use volume_group::{VolumeGroup, VolumeGroupSpec};
pub use volume_snapshot::{
    VolumeSnapshot, VolumeSnapshotSource, VolumeSnapshotSpec, VolumeSnapshotStatus,
};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// CRDs this crate installs, in install order
pub fn owned_crds() -> Vec<CustomResourceDefinition> {
    vec![
        VolumeGroup::crd(),
        VolumeGroupSnapshot::crd(),
        VolumeGroupSnapshotContent::crd(),
    ]
}
