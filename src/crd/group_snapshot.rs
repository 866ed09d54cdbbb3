//! VolumeGroupSnapshot Custom Resource Definition
//!
//! A VolumeGroupSnapshot is the user-facing request to snapshot every claim in
//! a VolumeGroup. The controller binds it to exactly one
//! VolumeGroupSnapshotContent and copies that content's readiness back here.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::SnapshotError;

/// Specification for a VolumeGroupSnapshot
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "volumegroup.example.com",
    version = "v1alpha1",
    kind = "VolumeGroupSnapshot",
    plural = "volumegroupsnapshots",
    shortname = "vgs",
    status = "VolumeGroupSnapshotStatus",
    namespaced,
    printcolumn = r#"{"name":"ReadyToUse","type":"boolean","jsonPath":".status.readyToUse"}"#,
    printcolumn = r#"{"name":"VolumeGroup","type":"string","jsonPath":".spec.volumeGroupName"}"#,
    printcolumn = r#"{"name":"VolumeGroupSnapshotContent","type":"string","jsonPath":".spec.boundVolumeGroupSnapshotContentName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotSpec {
    /// VolumeGroup to snapshot, in the same namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_group_name: Option<String>,

    /// Content this request is bound to. Set once by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_volume_group_snapshot_content_name: Option<String>,

    /// VolumeSnapshotClass passed down to every per-volume snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
}

/// Status for a VolumeGroupSnapshot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotStatus {
    /// True once every member snapshot is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_to_use: Option<bool>,

    /// Earliest creation time across member snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,

    /// Last failure observed while converging this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SnapshotError>,
}

impl VolumeGroupSnapshot {
    /// Returns true once the request has been marked ready
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.ready_to_use)
            .unwrap_or(false)
    }

    /// Name of the bound content, if any
    pub fn bound_content(&self) -> Option<&str> {
        self.spec
            .bound_volume_group_snapshot_content_name
            .as_deref()
            .filter(|n| !n.is_empty())
    }

    /// Name of the referenced group, if any
    pub fn volume_group(&self) -> Option<&str> {
        self.spec
            .volume_group_name
            .as_deref()
            .filter(|n| !n.is_empty())
    }

    /// Current status error, if any
    pub fn error(&self) -> Option<&SnapshotError> {
        self.status.as_ref().and_then(|s| s.error.as_ref())
    }
}
