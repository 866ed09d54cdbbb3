//! VolumeGroup Custom Resource Definition
//!
//! A VolumeGroup names a set of PersistentVolumeClaims in its namespace by
//! label selector. Controllers only read it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::selector::VolumeSelector;

/// Specification for a VolumeGroup
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "volumegroup.example.com",
    version = "v1alpha1",
    kind = "VolumeGroup",
    plural = "volumegroups",
    shortname = "vg",
    namespaced,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSpec {
    /// Selects member claims. Absent selects nothing, `{}` selects every claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<VolumeSelector>,
}
