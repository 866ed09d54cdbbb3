//! Resource store seam for the snapshot controllers
//!
//! Controllers talk to the cluster only through [`SnapshotStore`], which lets
//! the convergence logic run against mocks and in-memory fakes in tests and
//! against the API server in production via [`KubeStore`].
//!
//! Gets return `Ok(None)` for absent objects. Creates fail with
//! [`Error::AlreadyExists`] on a name clash and updates fail with
//! [`Error::Conflict`] on a stale resourceVersion, so callers can decide which
//! of those are benign.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::crd::{
    VolumeGroup, VolumeGroupSnapshot, VolumeGroupSnapshotContent, VolumeSelector, VolumeSnapshot,
};
use crate::Error;

/// Trait abstracting resource store operations for the snapshot controllers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetch a VolumeGroupSnapshot
    async fn get_group_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeGroupSnapshot>, Error>;

    /// Replace a VolumeGroupSnapshot's spec and metadata
    async fn update_group_snapshot(
        &self,
        vgs: &VolumeGroupSnapshot,
    ) -> Result<VolumeGroupSnapshot, Error>;

    /// Replace a VolumeGroupSnapshot's status
    async fn update_group_snapshot_status(
        &self,
        vgs: &VolumeGroupSnapshot,
    ) -> Result<VolumeGroupSnapshot, Error>;

    /// Fetch a VolumeGroup
    async fn get_volume_group(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeGroup>, Error>;

    /// Names of the PersistentVolumeClaims in `namespace` matching `selector`
    async fn list_volumes(
        &self,
        namespace: &str,
        selector: &VolumeSelector,
    ) -> Result<Vec<String>, Error>;

    /// Fetch a VolumeGroupSnapshotContent
    async fn get_content(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeGroupSnapshotContent>, Error>;

    /// Create a VolumeGroupSnapshotContent
    async fn create_content(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<VolumeGroupSnapshotContent, Error>;

    /// Replace a VolumeGroupSnapshotContent's spec and metadata
    async fn update_content(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<VolumeGroupSnapshotContent, Error>;

    /// Replace a VolumeGroupSnapshotContent's status
    async fn update_content_status(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<VolumeGroupSnapshotContent, Error>;

    /// Fetch a VolumeSnapshot
    async fn get_volume_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeSnapshot>, Error>;

    /// Create a VolumeSnapshot
    async fn create_volume_snapshot(&self, vs: &VolumeSnapshot) -> Result<VolumeSnapshot, Error>;
}

/// Production store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of<K: ResourceExt>(obj: &K) -> Result<String, Error> {
    obj.namespace()
        .ok_or_else(|| Error::internal(format!("{} has no namespace", obj.name_any())))
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[async_trait]
impl SnapshotStore for KubeStore {
    async fn get_group_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeGroupSnapshot>, Error> {
        self.api::<VolumeGroupSnapshot>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshot", key(namespace, name), e))
    }

    async fn update_group_snapshot(
        &self,
        vgs: &VolumeGroupSnapshot,
    ) -> Result<VolumeGroupSnapshot, Error> {
        let namespace = namespace_of(vgs)?;
        let name = vgs.name_any();
        self.api::<VolumeGroupSnapshot>(&namespace)
            .replace(&name, &PostParams::default(), vgs)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshot", key(&namespace, &name), e))
    }

    async fn update_group_snapshot_status(
        &self,
        vgs: &VolumeGroupSnapshot,
    ) -> Result<VolumeGroupSnapshot, Error> {
        let namespace = namespace_of(vgs)?;
        let name = vgs.name_any();
        let data = serde_json::to_vec(vgs).map_err(|e| Error::serialization(e.to_string()))?;
        self.api::<VolumeGroupSnapshot>(&namespace)
            .replace_status(&name, &PostParams::default(), data)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshot", key(&namespace, &name), e))
    }

    async fn get_volume_group(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeGroup>, Error> {
        self.api::<VolumeGroup>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube("VolumeGroup", key(namespace, name), e))
    }

    async fn list_volumes(
        &self,
        namespace: &str,
        selector: &VolumeSelector,
    ) -> Result<Vec<String>, Error> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_query()?);
        }

        let claims = self
            .api::<PersistentVolumeClaim>(namespace)
            .list(&params)
            .await
            .map_err(|e| Error::from_kube("PersistentVolumeClaim", namespace.to_string(), e))?;

        // The label query is a pre-filter; membership is decided here.
        Ok(claims
            .items
            .into_iter()
            .filter(|pvc| selector.matches(pvc.labels()))
            .map(|pvc| pvc.name_any())
            .collect())
    }

    async fn get_content(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeGroupSnapshotContent>, Error> {
        self.api::<VolumeGroupSnapshotContent>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshotContent", key(namespace, name), e))
    }

    async fn create_content(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<VolumeGroupSnapshotContent, Error> {
        let namespace = namespace_of(content)?;
        let name = content.name_any();
        self.api::<VolumeGroupSnapshotContent>(&namespace)
            .create(&PostParams::default(), content)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshotContent", key(&namespace, &name), e))
    }

    async fn update_content(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<VolumeGroupSnapshotContent, Error> {
        let namespace = namespace_of(content)?;
        let name = content.name_any();
        self.api::<VolumeGroupSnapshotContent>(&namespace)
            .replace(&name, &PostParams::default(), content)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshotContent", key(&namespace, &name), e))
    }

    async fn update_content_status(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<VolumeGroupSnapshotContent, Error> {
        let namespace = namespace_of(content)?;
        let name = content.name_any();
        let data = serde_json::to_vec(content).map_err(|e| Error::serialization(e.to_string()))?;
        self.api::<VolumeGroupSnapshotContent>(&namespace)
            .replace_status(&name, &PostParams::default(), data)
            .await
            .map_err(|e| Error::from_kube("VolumeGroupSnapshotContent", key(&namespace, &name), e))
    }

    async fn get_volume_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VolumeSnapshot>, Error> {
        self.api::<VolumeSnapshot>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube("VolumeSnapshot", key(namespace, name), e))
    }

    async fn create_volume_snapshot(&self, vs: &VolumeSnapshot) -> Result<VolumeSnapshot, Error> {
        let namespace = namespace_of(vs)?;
        let name = vs.name_any();
        self.api::<VolumeSnapshot>(&namespace)
            .create(&PostParams::default(), vs)
            .await
            .map_err(|e| Error::from_kube("VolumeSnapshot", key(&namespace, &name), e))
    }
}
