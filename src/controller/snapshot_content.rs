//! VolumeGroupSnapshotContent controller
//!
//! Fans a content out into one VolumeSnapshot per required claim, then waits
//! for all of them to report ready.
//!
//! Coverage is recomputed from scratch on every pass: a claim counts as
//! covered only if some listed VolumeSnapshot still exists and targets it.
//! Snapshot names are derived from the content identity and the claim, so a
//! snapshot deleted out from under us is recreated under the same name and
//! never listed twice.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

use super::{object_key, Context, Outcome};
use crate::crd::{
    same_error, SnapshotError, VolumeGroupSnapshotContent, VolumeSnapshot, VolumeSnapshotSource,
    VolumeSnapshotSpec,
};
use crate::events::{actions, reasons};
use crate::{naming, Error, CONTENT_LABEL, CONTROLLER_NAME, MANAGED_BY_LABEL};

/// Kind name used in requeue keys and error messages
pub const KIND: &str = "VolumeGroupSnapshotContent";

/// Reconcile a VolumeGroupSnapshotContent
#[instrument(skip(content, ctx), fields(content = %content.name_any(), namespace = ?content.namespace()))]
pub async fn reconcile(
    content: Arc<VolumeGroupSnapshotContent>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = content.name_any();
    let namespace = content
        .namespace()
        .ok_or_else(|| Error::internal(format!("{KIND} {name} has no namespace")))?;

    match converge_content(&ctx, &namespace, &name).await {
        Ok(outcome) => {
            debug!(?outcome, "VolumeGroupSnapshotContent pass finished");
            Ok(ctx.action_for(&object_key(KIND, &namespace, &name), outcome))
        }
        Err(e) => {
            record_failure(&ctx, &namespace, &name, &e).await;
            Err(e)
        }
    }
}

/// Requeue a failed VolumeGroupSnapshotContent with per-object backoff
pub fn error_policy(
    content: Arc<VolumeGroupSnapshotContent>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    let name = content.name_any();
    let namespace = content.namespace().unwrap_or_default();
    warn!(
        content = %name,
        namespace = %namespace,
        error = %error,
        "VolumeGroupSnapshotContent reconciliation failed"
    );
    ctx.requeue.on_error(&object_key(KIND, &namespace, &name))
}

/// Run one convergence pass for the VolumeGroupSnapshotContent `namespace/name`
pub async fn converge_content(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<Outcome, Error> {
    let Some(content) = ctx.store.get_content(namespace, name).await? else {
        debug!(content = %name, "VolumeGroupSnapshotContent no longer exists");
        return Ok(Outcome::Done);
    };

    if content.is_ready() {
        return Ok(Outcome::Done);
    }

    let mut listed = Vec::with_capacity(content.spec.snapshot_list.len());
    for snapshot_name in &content.spec.snapshot_list {
        let snapshot = ctx.store.get_volume_snapshot(namespace, snapshot_name).await?;
        if snapshot.is_none() {
            warn!(content = %name, snapshot = %snapshot_name, "Listed VolumeSnapshot is missing");
        }
        listed.push((snapshot_name.clone(), snapshot));
    }

    let missing = missing_claims(&content, &listed);
    if !missing.is_empty() {
        return create_missing(ctx, content, missing).await;
    }

    aggregate_readiness(ctx, content, &listed).await
}

/// Required claims not targeted by any existing listed snapshot, sorted
pub fn missing_claims(
    content: &VolumeGroupSnapshotContent,
    listed: &[(String, Option<VolumeSnapshot>)],
) -> Vec<String> {
    let covered: BTreeSet<&str> = listed
        .iter()
        .filter_map(|(_, snapshot)| snapshot.as_ref()?.source_claim())
        .collect();

    content
        .spec
        .persistent_volume_claim_list
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .difference(&covered)
        .map(|claim| claim.to_string())
        .collect()
}

async fn create_missing(
    ctx: &Context,
    mut content: VolumeGroupSnapshotContent,
    missing: Vec<String>,
) -> Result<Outcome, Error> {
    let content_name = content.name_any();

    for claim in missing {
        let snapshot = build_volume_snapshot(&content, &claim)?;
        let snapshot_name = snapshot.name_any();

        match ctx.store.create_volume_snapshot(&snapshot).await {
            Ok(_) => {
                info!(content = %content_name, snapshot = %snapshot_name, claim = %claim, "Created VolumeSnapshot");
                ctx.publish(
                    content.object_ref(&()),
                    EventType::Normal,
                    reasons::SNAPSHOT_CREATED,
                    actions::CREATE,
                    format!("Created VolumeSnapshot {snapshot_name} for claim {claim}"),
                )
                .await;
            }
            Err(e) if e.is_already_exists() => {
                debug!(snapshot = %snapshot_name, "VolumeSnapshot already exists");
            }
            Err(e) => return Err(e),
        }

        // Persist after every creation so a failure later in the loop never
        // loses track of a created child.
        if !content.spec.snapshot_list.contains(&snapshot_name) {
            content.spec.snapshot_list.push(snapshot_name);
            content = ctx.store.update_content(&content).await?;
        }
    }

    Ok(Outcome::Progressed)
}

async fn aggregate_readiness(
    ctx: &Context,
    mut content: VolumeGroupSnapshotContent,
    listed: &[(String, Option<VolumeSnapshot>)],
) -> Result<Outcome, Error> {
    let content_name = content.name_any();
    let mut pending = 0usize;
    let mut first_error: Option<SnapshotError> = None;
    let mut earliest: Option<DateTime<Utc>> = None;

    for (snapshot_name, snapshot) in listed {
        let Some(snapshot) = snapshot else {
            pending += 1;
            continue;
        };
        if snapshot.ready_to_use() != Some(true) {
            pending += 1;
            if first_error.is_none() {
                first_error = snapshot.error().map(|e| SnapshotError {
                    time: e.time.or_else(|| Some(Utc::now())),
                    message: Some(format!(
                        "VolumeSnapshot {snapshot_name}: {}",
                        e.message.as_deref().unwrap_or("failed")
                    )),
                });
            }
            continue;
        }
        if let Some(created) = snapshot.creation_time() {
            earliest = Some(earliest.map_or(created, |t| t.min(created)));
        }
    }

    if pending > 0 {
        // Mirror the first item error, including its absence.
        if !same_error(first_error.as_ref(), content.error()) {
            content.status.get_or_insert_with(Default::default).error = first_error;
            ctx.store.update_content_status(&content).await?;
        }
        debug!(content = %content_name, pending, total = listed.len(), "Waiting for VolumeSnapshots");
        return Ok(Outcome::Waiting);
    }

    let status = content.status.get_or_insert_with(Default::default);
    status.ready_to_use = Some(true);
    status.creation_time = Some(earliest.unwrap_or_else(Utc::now));
    status.error = None;
    ctx.store.update_content_status(&content).await?;

    info!(content = %content_name, snapshots = listed.len(), "VolumeGroupSnapshotContent is ready");
    ctx.publish(
        content.object_ref(&()),
        EventType::Normal,
        reasons::CONTENT_READY,
        actions::RECONCILE,
        format!("{} VolumeSnapshots ready", listed.len()),
    )
    .await;
    Ok(Outcome::Done)
}

/// Build the VolumeSnapshot `content` owns for `claim`
pub fn build_volume_snapshot(
    content: &VolumeGroupSnapshotContent,
    claim: &str,
) -> Result<VolumeSnapshot, Error> {
    let name = content.name_any();
    let namespace = content
        .namespace()
        .ok_or_else(|| Error::internal(format!("{KIND} {name} has no namespace")))?;
    let uid = content
        .uid()
        .ok_or_else(|| Error::internal(format!("{KIND} {namespace}/{name} has no uid")))?;
    let owner = content
        .controller_owner_ref(&())
        .ok_or_else(|| Error::internal(format!("{KIND} {namespace}/{name} has no uid")))?;

    let labels = BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string()),
        (CONTENT_LABEL.to_string(), name.clone()),
    ]);

    Ok(VolumeSnapshot {
        metadata: ObjectMeta {
            name: Some(naming::snapshot_name(&namespace, &name, &uid, claim)),
            namespace: Some(namespace),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: VolumeSnapshotSpec {
            source: VolumeSnapshotSource {
                persistent_volume_claim_name: Some(claim.to_string()),
                volume_snapshot_content_name: None,
            },
            volume_snapshot_class_name: content.spec.volume_snapshot_class_name.clone(),
        },
        status: None,
    })
}

/// Write the failure onto the content's status, best effort
async fn record_failure(ctx: &Context, namespace: &str, name: &str, error: &Error) {
    let mut content = match ctx.store.get_content(namespace, name).await {
        Ok(Some(content)) if !content.is_ready() => content,
        Ok(_) => return,
        Err(e) => {
            warn!(content = %name, error = %e, "Failed to re-read VolumeGroupSnapshotContent");
            return;
        }
    };

    let recorded = SnapshotError::now(error.to_string());
    if same_error(Some(&recorded), content.error()) {
        return;
    }

    content.status.get_or_insert_with(Default::default).error = Some(recorded);
    if let Err(e) = ctx.store.update_content_status(&content).await {
        warn!(content = %name, error = %e, "Failed to record error on VolumeGroupSnapshotContent");
        return;
    }

    ctx.publish(
        content.object_ref(&()),
        EventType::Warning,
        reasons::RECONCILE_FAILED,
        actions::RECONCILE,
        error.to_string(),
    )
    .await;
}
