//! Shared status types for volume group snapshot CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Last observed failure for a snapshot object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotError {
    /// When the failure was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Human-readable failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SnapshotError {
    /// Create an error stamped with the current time
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            time: Some(Utc::now()),
            message: Some(message.into()),
        }
    }

    /// Same failure as `other`, ignoring when it was observed
    pub fn same_message(&self, other: &SnapshotError) -> bool {
        self.message == other.message
    }
}

/// Compare optional errors by message only.
///
/// Re-stamping an unchanged message would turn every poll into a status write.
pub fn same_error(a: Option<&SnapshotError>, b: Option<&SnapshotError>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_message(b),
        _ => false,
    }
}
