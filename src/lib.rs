//! VolumeGroup - group snapshots for Kubernetes PersistentVolumeClaims
//!
//! A `VolumeGroupSnapshot` asks for a point-in-time snapshot of every claim in
//! a `VolumeGroup`. Two controllers converge it:
//!
//! 1. The group-snapshot controller captures the group's current members into
//!    a `VolumeGroupSnapshotContent` and binds the request to it.
//! 2. The content controller creates one CSI `VolumeSnapshot` per member and
//!    marks the content ready once all of them are ready, after which the
//!    request is marked ready too.
//!
//! Both loops are level-triggered: each pass re-reads cluster state, performs
//! at most the next step, and asks to be requeued.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions and the consumed VolumeSnapshot type
//! - [`controller`] - Convergence logic and requeue policy
//! - [`store`] - Resource store seam (API server or test doubles)
//! - [`naming`] - Content-addressed child names
//! - [`events`] - Kubernetes Event publishing
//! - [`runner`] - Controller wiring and CRD installation
//! - [`config`] - CLI and environment configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`retry`] - Bounded retry for startup calls
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod naming;
pub mod retry;
pub mod runner;
pub mod store;
pub mod telemetry;

pub use error::Error;

// =============================================================================
// Identity
// =============================================================================

/// Name reported on Events and in `app.kubernetes.io/managed-by`
pub const CONTROLLER_NAME: &str = "volumegroup-controller";

/// Field manager for server-side apply
pub const FIELD_MANAGER: &str = "volumegroup-controller";

// =============================================================================
// Labels
// =============================================================================

/// Standard label marking objects this controller created
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label on a VolumeGroupSnapshotContent naming the uid of its request
pub const GROUP_SNAPSHOT_UID_LABEL: &str = "volumegroup.example.com/group-snapshot-uid";

/// Label on a VolumeSnapshot naming the content that created it
pub const CONTENT_LABEL: &str = "volumegroup.example.com/content";
