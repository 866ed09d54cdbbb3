//! VolumeGroupSnapshot controller
//!
//! Moves a request through three states:
//!
//! 1. **Unbound**: resolve the VolumeGroup, capture its current member claims
//!    into a new VolumeGroupSnapshotContent and bind the request to it.
//! 2. **Bound, pending**: poll the content until it reports ready, surfacing
//!    any content-level error on the request meanwhile.
//! 3. **Ready**: terminal. Readiness is never cleared.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

use super::{object_key, Context, Outcome};
use crate::crd::{
    same_error, SnapshotError, VolumeGroupSnapshot, VolumeGroupSnapshotContent,
    VolumeGroupSnapshotContentSpec,
};
use crate::events::{actions, reasons};
use crate::{naming, Error, CONTROLLER_NAME, GROUP_SNAPSHOT_UID_LABEL, MANAGED_BY_LABEL};

/// Kind name used in requeue keys and error messages
pub const KIND: &str = "VolumeGroupSnapshot";

/// Reconcile a VolumeGroupSnapshot
#[instrument(skip(vgs, ctx), fields(group_snapshot = %vgs.name_any(), namespace = ?vgs.namespace()))]
pub async fn reconcile(vgs: Arc<VolumeGroupSnapshot>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = vgs.name_any();
    let namespace = vgs
        .namespace()
        .ok_or_else(|| Error::internal(format!("{KIND} {name} has no namespace")))?;

    match converge_group_snapshot(&ctx, &namespace, &name).await {
        Ok(outcome) => {
            debug!(?outcome, "VolumeGroupSnapshot pass finished");
            Ok(ctx.action_for(&object_key(KIND, &namespace, &name), outcome))
        }
        Err(e) => {
            record_failure(&ctx, &namespace, &name, &e).await;
            Err(e)
        }
    }
}

/// Requeue a failed VolumeGroupSnapshot with per-object backoff
pub fn error_policy(vgs: Arc<VolumeGroupSnapshot>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = vgs.name_any();
    let namespace = vgs.namespace().unwrap_or_default();
    warn!(
        group_snapshot = %name,
        namespace = %namespace,
        error = %error,
        "VolumeGroupSnapshot reconciliation failed"
    );
    ctx.requeue.on_error(&object_key(KIND, &namespace, &name))
}

/// Run one convergence pass for the VolumeGroupSnapshot `namespace/name`
pub async fn converge_group_snapshot(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<Outcome, Error> {
    let Some(vgs) = ctx.store.get_group_snapshot(namespace, name).await? else {
        debug!(group_snapshot = %name, "VolumeGroupSnapshot no longer exists");
        return Ok(Outcome::Done);
    };

    if vgs.is_ready() {
        return Ok(Outcome::Done);
    }

    match vgs.bound_content().map(str::to_string) {
        None => bind_content(ctx, vgs).await,
        Some(content_name) => propagate_readiness(ctx, vgs, &content_name).await,
    }
}

async fn bind_content(ctx: &Context, mut vgs: VolumeGroupSnapshot) -> Result<Outcome, Error> {
    let name = vgs.name_any();
    let namespace = vgs.namespace().unwrap_or_default();

    let Some(group_name) = vgs.volume_group().map(str::to_string) else {
        debug!(group_snapshot = %name, "No VolumeGroup referenced yet");
        set_error(ctx, &mut vgs, None).await?;
        return Ok(Outcome::Waiting);
    };

    let group = ctx
        .store
        .get_volume_group(&namespace, &group_name)
        .await?
        .ok_or_else(|| Error::not_found("VolumeGroup", format!("{namespace}/{group_name}")))?;

    let volumes = match &group.spec.selector {
        Some(selector) => ctx.store.list_volumes(&namespace, selector).await?,
        None => vec![],
    };

    let content = build_content(&vgs, volumes)?;
    let content_name = content.name_any();

    match ctx.store.create_content(&content).await {
        Ok(_) => {
            info!(
                group_snapshot = %name,
                content = %content_name,
                volumes = content.spec.persistent_volume_claim_list.len(),
                "Created VolumeGroupSnapshotContent"
            );
            ctx.publish(
                vgs.object_ref(&()),
                EventType::Normal,
                reasons::CONTENT_CREATED,
                actions::CREATE,
                format!(
                    "Created VolumeGroupSnapshotContent {content_name} for {} volumes",
                    content.spec.persistent_volume_claim_list.len()
                ),
            )
            .await;
        }
        Err(e) if e.is_already_exists() => {
            debug!(content = %content_name, "VolumeGroupSnapshotContent already exists");
        }
        Err(e) => return Err(e),
    }

    vgs.spec.bound_volume_group_snapshot_content_name = Some(content_name);
    ctx.store.update_group_snapshot(&vgs).await?;
    Ok(Outcome::Progressed)
}

async fn propagate_readiness(
    ctx: &Context,
    mut vgs: VolumeGroupSnapshot,
    content_name: &str,
) -> Result<Outcome, Error> {
    let name = vgs.name_any();
    let namespace = vgs.namespace().unwrap_or_default();

    let content = ctx
        .store
        .get_content(&namespace, content_name)
        .await?
        .ok_or_else(|| {
            Error::not_found(
                "VolumeGroupSnapshotContent",
                format!("{namespace}/{content_name}"),
            )
        })?;

    if content.is_ready() {
        let status = vgs.status.get_or_insert_with(Default::default);
        status.ready_to_use = Some(true);
        status.creation_time = content.status.as_ref().and_then(|s| s.creation_time);
        status.error = None;
        ctx.store.update_group_snapshot_status(&vgs).await?;

        info!(group_snapshot = %name, content = %content_name, "VolumeGroupSnapshot is ready");
        ctx.publish(
            vgs.object_ref(&()),
            EventType::Normal,
            reasons::GROUP_SNAPSHOT_READY,
            actions::RECONCILE,
            format!("All snapshots in {content_name} are ready"),
        )
        .await;
        return Ok(Outcome::Done);
    }

    // Mirror the content's error, including its absence.
    set_error(ctx, &mut vgs, content.error().cloned()).await?;

    debug!(group_snapshot = %name, content = %content_name, "Waiting for content to become ready");
    Ok(Outcome::Waiting)
}

/// Write `error` onto the request's status when it differs from what is recorded
async fn set_error(
    ctx: &Context,
    vgs: &mut VolumeGroupSnapshot,
    error: Option<SnapshotError>,
) -> Result<(), Error> {
    if same_error(error.as_ref(), vgs.error()) {
        return Ok(());
    }
    vgs.status.get_or_insert_with(Default::default).error = error;
    *vgs = ctx.store.update_group_snapshot_status(vgs).await?;
    Ok(())
}

/// Build the content for `vgs` covering `volumes`.
///
/// Volumes are sorted and de-duplicated. The content is owned by the request
/// so deleting the request cascades to it.
pub fn build_content(
    vgs: &VolumeGroupSnapshot,
    mut volumes: Vec<String>,
) -> Result<VolumeGroupSnapshotContent, Error> {
    let name = vgs.name_any();
    let namespace = vgs
        .namespace()
        .ok_or_else(|| Error::internal(format!("{KIND} {name} has no namespace")))?;
    let uid = vgs
        .uid()
        .ok_or_else(|| Error::internal(format!("{KIND} {namespace}/{name} has no uid")))?;
    let owner = vgs
        .controller_owner_ref(&())
        .ok_or_else(|| Error::internal(format!("{KIND} {namespace}/{name} has no uid")))?;

    volumes.sort();
    volumes.dedup();

    let labels = BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string()),
        (GROUP_SNAPSHOT_UID_LABEL.to_string(), uid.clone()),
    ]);

    Ok(VolumeGroupSnapshotContent {
        metadata: ObjectMeta {
            name: Some(naming::content_name(&namespace, &name, &uid)),
            namespace: Some(namespace),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: VolumeGroupSnapshotContentSpec {
            volume_group_snapshot_name: name,
            persistent_volume_claim_list: volumes,
            snapshot_list: vec![],
            volume_snapshot_class_name: vgs.spec.volume_snapshot_class_name.clone(),
        },
        status: None,
    })
}

/// Write the failure onto the request's status, best effort.
///
/// Skipped when the request is gone or already ready, and when the same
/// message is already recorded.
async fn record_failure(ctx: &Context, namespace: &str, name: &str, error: &Error) {
    let mut vgs = match ctx.store.get_group_snapshot(namespace, name).await {
        Ok(Some(vgs)) if !vgs.is_ready() => vgs,
        Ok(_) => return,
        Err(e) => {
            warn!(group_snapshot = %name, error = %e, "Failed to re-read VolumeGroupSnapshot");
            return;
        }
    };

    let recorded = SnapshotError::now(error.to_string());
    if same_error(Some(&recorded), vgs.error()) {
        return;
    }

    vgs.status.get_or_insert_with(Default::default).error = Some(recorded);
    if let Err(e) = ctx.store.update_group_snapshot_status(&vgs).await {
        warn!(group_snapshot = %name, error = %e, "Failed to record error on VolumeGroupSnapshot");
        return;
    }

    ctx.publish(
        vgs.object_ref(&()),
        EventType::Warning,
        reasons::RECONCILE_FAILED,
        actions::RECONCILE,
        error.to_string(),
    )
    .await;
}
