use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Resource, ResourceExt};
use serde::Serialize;

use crate::annotations::{ensure_mutation_eligible, is_clone_result, is_source_eligible};
use crate::store::{NamespaceStore, ResourceStore, StoreError};
use crate::Result;

const REDACTED: &str = "<redacted>";

/// A namespace that may serve as a clone source.
#[derive(Clone, Debug, Serialize)]
pub struct NamespaceView {
    pub name: String,
    pub cloned: bool,
    pub labels: BTreeMap<String, String>,
}

/// A deployment that currently has replicas scheduled.
#[derive(Clone, Debug, Serialize)]
pub struct DeploymentView {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

/// Lists the namespaces annotated as cloneable, flagging the ones that are
/// themselves clone results.
pub async fn list_cloneable_namespaces<S: NamespaceStore>(store: &S) -> Result<Vec<NamespaceView>> {
    let namespaces = store.list_namespaces().await?;
    Ok(namespaces
        .iter()
        .filter(|ns| is_source_eligible(ns))
        .map(|ns| NamespaceView {
            name: ns.name_any(),
            cloned: is_clone_result(ns),
            labels: ns.labels().clone(),
        })
        .collect())
}

/// Lists the deployments in `namespace` with at least one desired replica.
/// An unset replica count means one, per the cluster default.
pub async fn list_active_deployments<S: ResourceStore<Deployment>>(
    store: &S,
    namespace: &str,
) -> Result<Vec<DeploymentView>> {
    let deployments: Vec<Deployment> = list_or_empty(store, namespace).await?;
    Ok(deployments
        .iter()
        .filter(|d| d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1) > 0)
        .map(|d| DeploymentView {
            name: d.name_any(),
            namespace: namespace.to_string(),
            labels: d.labels().clone(),
        })
        .collect())
}

/// Container images per cloned deployment, keyed by deployment name then
/// container name.
pub async fn list_deployment_containers<S: ResourceStore<Deployment>>(
    store: &S,
    namespace: &str,
) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let deployments: Vec<Deployment> = list_or_empty(store, namespace).await?;
    Ok(deployments
        .iter()
        .filter(|d| ensure_mutation_eligible(*d).is_ok())
        .map(|d| {
            let containers = d
                .spec
                .as_ref()
                .and_then(|s| s.template.spec.as_ref())
                .map(|ps| ps.containers.as_slice())
                .unwrap_or(&[])
                .iter()
                .map(|c| (c.name.clone(), c.image.clone().unwrap_or_default()))
                .collect();
            (d.name_any(), containers)
        })
        .collect())
}

/// Key names per cloned secret with every value redacted. Helm release
/// bookkeeping secrets are left out.
pub async fn list_secret_keys<S: ResourceStore<Secret>>(
    store: &S,
    namespace: &str,
) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let secrets: Vec<Secret> = list_or_empty(store, namespace).await?;
    Ok(secrets
        .iter()
        .filter(|s| !s.name_any().starts_with("sh.helm.release"))
        .filter(|s| ensure_mutation_eligible(*s).is_ok())
        .map(|s| {
            let keys = s
                .data
                .as_ref()
                .map(|data| {
                    data.keys()
                        .map(|k| (k.clone(), REDACTED.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            (s.name_any(), keys)
        })
        .collect())
}

/// Full data per cloned config map. The cluster-managed root CA bundle is
/// left out.
pub async fn list_config_map_data<S: ResourceStore<ConfigMap>>(
    store: &S,
    namespace: &str,
) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let config_maps: Vec<ConfigMap> = list_or_empty(store, namespace).await?;
    Ok(config_maps
        .iter()
        .filter(|cm| !cm.name_any().contains("kube-root-ca.crt"))
        .filter(|cm| ensure_mutation_eligible(*cm).is_ok())
        .map(|cm| (cm.name_any(), cm.data.clone().unwrap_or_default()))
        .collect())
}

// Views never surface a missing namespace as an error, only as emptiness.
async fn list_or_empty<K, S>(store: &S, namespace: &str) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()>,
    S: ResourceStore<K>,
{
    match store.list(namespace).await {
        Ok(objects) => Ok(objects),
        Err(StoreError::NotFound(_)) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}
