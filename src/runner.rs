//! Controller wiring
//!
//! Builds the controller futures and installs CRDs. Kept separate from
//! `main` so construction stays testable and the binary stays thin.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Error as ControllerError;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, error, info};

use crate::controller::{group_snapshot, object_key, snapshot_content, Context, RequeueConfig};
use crate::crd::{owned_crds, VolumeGroupSnapshot, VolumeGroupSnapshotContent, VolumeSnapshot};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{Error, FIELD_MANAGER};

/// Watcher timeout (seconds). Must stay below the client read timeout (30s)
/// so the API server closes idle watches before the client gives up on them.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A controller future, ready to be joined
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build both controllers sharing one context.
///
/// The request controller also watches contents it owns and the content
/// controller watches the VolumeSnapshots it owns, so a child status change
/// wakes the parent without waiting for the next poll.
pub fn build_controllers(
    client: Client,
    namespace: Option<&str>,
    requeue: RequeueConfig,
) -> Vec<ControllerFuture> {
    let ctx = Arc::new(Context::from_client(client.clone(), requeue));

    let requests: Api<VolumeGroupSnapshot> = scoped_api(&client, namespace);
    let contents: Api<VolumeGroupSnapshotContent> = scoped_api(&client, namespace);
    let snapshots: Api<VolumeSnapshot> = scoped_api(&client, namespace);

    match namespace {
        Some(ns) => info!(namespace = %ns, "Watching a single namespace"),
        None => info!("Watching all namespaces"),
    }

    let request_ctrl = Controller::new(requests, watcher_config())
        .owns(contents.clone(), watcher_config())
        .shutdown_on_signal()
        .run(group_snapshot::reconcile, group_snapshot::error_policy, ctx.clone())
        .for_each(handle_reconcile_result(group_snapshot::KIND, ctx.clone()));

    let content_ctrl = Controller::new(contents, watcher_config())
        .owns(snapshots, watcher_config())
        .shutdown_on_signal()
        .run(snapshot_content::reconcile, snapshot_content::error_policy, ctx.clone())
        .for_each(handle_reconcile_result(snapshot_content::KIND, ctx));

    vec![Box::pin(request_ctrl), Box::pin(content_ctrl)]
}

/// Server-side apply every CRD this crate owns
pub async fn install_crds(client: &Client) -> Result<(), Error> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in owned_crds() {
        let name = crd.name_any();
        info!(crd = %name, "Installing CRD");
        let patch = Patch::Apply(&crd);
        retry_with_backoff(&RetryConfig::default(), "install-crd", || {
            api.patch(&name, &params, &patch)
        })
        .await
        .map_err(|e| Error::from_kube("CustomResourceDefinition", name.clone(), e))?;
    }

    info!("All CRDs installed/updated");
    Ok(())
}

/// Render the owned CRDs as a multi-document YAML stream
pub fn crds_yaml() -> Result<String, Error> {
    let docs = owned_crds()
        .iter()
        .map(|crd| serde_yaml::to_string(crd).map_err(|e| Error::serialization(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(docs.join("---\n"))
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

/// Per-result hook for a controller stream.
///
/// Reconciler failures were already logged by `error_policy`. Objects that
/// vanished from the watch cache never reach `reconcile` again, so their
/// requeue counters are dropped here.
fn handle_reconcile_result<T, QErr>(
    kind: &'static str,
    ctx: Arc<Context>,
) -> impl Fn(Result<T, ControllerError<Error, QErr>>) -> std::future::Ready<()>
where
    T: std::fmt::Debug,
    QErr: std::fmt::Debug,
{
    move |result| {
        match result {
            Ok(action) => debug!(?action, "{} reconciliation completed", kind),
            Err(ControllerError::ReconcilerFailed(..)) => {}
            Err(ControllerError::ObjectNotFound(obj_ref)) => {
                let namespace = obj_ref.namespace.as_deref().unwrap_or_default();
                ctx.requeue.forget(&object_key(kind, namespace, &obj_ref.name));
                debug!(object = %obj_ref, "{} deleted, requeue state dropped", kind);
            }
            Err(e) => error!(error = ?e, "{} controller error", kind),
        }
        std::future::ready(())
    }
}
