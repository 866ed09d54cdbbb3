//! VolumeGroupSnapshotContent Custom Resource Definition
//!
//! The content is the materialized expansion of one VolumeGroupSnapshot: the
//! claims captured when it was created and the VolumeSnapshots created for
//! them so far.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::SnapshotError;

/// Specification for a VolumeGroupSnapshotContent
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "volumegroup.example.com",
    version = "v1alpha1",
    kind = "VolumeGroupSnapshotContent",
    plural = "volumegroupsnapshotcontents",
    shortname = "vgsc",
    status = "VolumeGroupSnapshotContentStatus",
    namespaced,
    printcolumn = r#"{"name":"ReadyToUse","type":"boolean","jsonPath":".status.readyToUse"}"#,
    printcolumn = r#"{"name":"VolumeGroupSnapshot","type":"string","jsonPath":".spec.volumeGroupSnapshotName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotContentSpec {
    /// Request this content was created for
    pub volume_group_snapshot_name: String,

    /// Claims to snapshot, sorted and unique. Fixed at creation.
    #[serde(default)]
    pub persistent_volume_claim_list: Vec<String>,

    /// VolumeSnapshots created for this content so far
    #[serde(default)]
    pub snapshot_list: Vec<String>,

    /// VolumeSnapshotClass for every created snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
}

/// Status for a VolumeGroupSnapshotContent
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotContentStatus {
    /// True once every listed snapshot is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_to_use: Option<bool>,

    /// Earliest creation time across listed snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,

    /// Last failure surfaced from the member snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SnapshotError>,
}

impl VolumeGroupSnapshotContent {
    /// Returns true once the content has been marked ready
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.ready_to_use)
            .unwrap_or(false)
    }

    /// Current status error, if any
    pub fn error(&self) -> Option<&SnapshotError> {
        self.status.as_ref().and_then(|s| s.error.as_ref())
    }
}
