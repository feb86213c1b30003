use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy of the cluster resource store.
///
/// NotFound is benign for list operations, Conflict is transient and only
/// retried for single-object patches, everything else is fatal for the
/// current stage.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Other(String),
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(ae.message),
            kube::Error::Api(ae) if ae.reason == "AlreadyExists" => {
                StoreError::AlreadyExists(ae.message)
            }
            kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(ae.message),
            other => StoreError::Other(other.to_string()),
        }
    }
}

/// A single JSON Patch `replace` operation, the only patch shape the
/// mutation operations emit.
#[derive(Clone, Debug, Serialize)]
pub struct PatchOp {
    pub op: &'static str,
    pub path: String,
    pub value: Value,
}

impl PatchOp {
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        PatchOp {
            op: "replace",
            path: path.into(),
            value,
        }
    }
}

/// Namespaced access to one resource kind.
#[async_trait]
pub trait ResourceStore<K>: Send + Sync {
    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError>;
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError>;
    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError>;
    async fn patch(&self, namespace: &str, name: &str, ops: &[PatchOp]) -> Result<K, StoreError>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Cluster-scoped namespace access.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError>;
    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError>;
    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, StoreError>;
    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError>;
}

/// The production store, backed by a kube client.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl<K> ResourceStore<K> for KubeStore
where
    K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync,
{
    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        Ok(self.api::<K>(namespace).get(name).await?)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        Ok(self
            .api::<K>(namespace)
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn patch(&self, namespace: &str, name: &str, ops: &[PatchOp]) -> Result<K, StoreError> {
        let doc: json_patch::Patch = serde_json::from_value(
            serde_json::to_value(ops).map_err(|e| StoreError::Other(e.to_string()))?,
        )
        .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(self
            .api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Json::<()>(doc))
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NamespaceStore for KubeStore {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let list = self.namespaces().list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError> {
        Ok(self.namespaces().get(name).await?)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, StoreError> {
        Ok(self
            .namespaces()
            .create(&PostParams::default(), namespace)
            .await?)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError> {
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
