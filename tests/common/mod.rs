#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use ns_cloner::annotations::{CLONED, ENABLED, SOURCE_NAMESPACE};
use ns_cloner::poll::PollSettings;
use ns_cloner::store::{NamespaceStore, PatchOp, ResourceStore, StoreError};

type ObjectKey = (String, String, String);

/// In-memory stand-in for a cluster. Objects live in a flat map keyed by
/// kind, namespace and name; readiness status materializes after a
/// configurable number of reads, imitating a rollout that takes a few
/// polls to settle.
pub struct MemoryStore {
    namespaces: Mutex<BTreeMap<String, Namespace>>,
    objects: Mutex<BTreeMap<ObjectKey, Value>>,
    gets: Mutex<BTreeMap<ObjectKey, u32>>,
    rollout_after: u32,
    fail_create_kind: Mutex<Option<&'static str>>,
    fail_rollout_name: Mutex<Option<String>>,
    conflicts: Mutex<u32>,
    patch_calls: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_rollout_after(0)
    }

    /// Objects report readiness only after this many successful reads.
    pub fn with_rollout_after(rollout_after: u32) -> Self {
        MemoryStore {
            namespaces: Mutex::new(BTreeMap::new()),
            objects: Mutex::new(BTreeMap::new()),
            gets: Mutex::new(BTreeMap::new()),
            rollout_after,
            fail_create_kind: Mutex::new(None),
            fail_rollout_name: Mutex::new(None),
            conflicts: Mutex::new(0),
            patch_calls: Mutex::new(0),
        }
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        let name = namespace.name_any();
        self.namespaces.lock().unwrap().insert(name, namespace);
    }

    /// Seeds an object directly, bypassing the create path.
    pub fn seed<K>(&self, namespace: &str, object: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let key = (
            K::kind(&()).to_string(),
            namespace.to_string(),
            object.name_any(),
        );
        self.objects
            .lock()
            .unwrap()
            .insert(key, serde_json::to_value(object).unwrap());
    }

    /// Every create of this kind fails from now on.
    pub fn fail_creates_of(&self, kind: &'static str) {
        *self.fail_create_kind.lock().unwrap() = Some(kind);
    }

    /// Reads of this workload report a terminal replica failure.
    pub fn fail_rollout_of(&self, name: &str) {
        *self.fail_rollout_name.lock().unwrap() = Some(name.to_string());
    }

    /// The next `n` patches fail with a write conflict.
    pub fn inject_conflicts(&self, n: u32) {
        *self.conflicts.lock().unwrap() = n;
    }

    pub fn patch_calls(&self) -> u32 {
        *self.patch_calls.lock().unwrap()
    }

    pub fn namespace_exists(&self, name: &str) -> bool {
        self.namespaces.lock().unwrap().contains_key(name)
    }

    pub fn get_count(&self, kind: &str, namespace: &str, name: &str) -> u32 {
        self.gets
            .lock()
            .unwrap()
            .get(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Fetches an object as stored, without the simulated rollout status.
    pub fn stored<K>(&self, namespace: &str, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = (
            K::kind(&()).to_string(),
            namespace.to_string(),
            name.to_string(),
        );
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    fn observed(&self, kind: &str, name: &str, raw: &Value, reads: u32) -> Value {
        let mut out = raw.clone();
        let failing = self.fail_rollout_name.lock().unwrap().as_deref() == Some(name);
        match kind {
            "Deployment" | "StatefulSet" if failing => {
                out["status"] = json!({
                    "readyReplicas": 0,
                    "conditions": [{
                        "type": "ReplicaFailure",
                        "status": "True",
                        "reason": "FailedCreate",
                    }],
                });
            }
            "Deployment" | "StatefulSet" if reads > self.rollout_after => {
                let replicas = out
                    .pointer("/spec/replicas")
                    .and_then(Value::as_i64)
                    .unwrap_or(1);
                out["status"] = json!({ "readyReplicas": replicas });
            }
            "Service" if reads > self.rollout_after => {
                out["spec"]["clusterIP"] = json!("10.96.0.10");
            }
            _ => {}
        }
        out
    }
}

#[async_trait]
impl<K> ResourceStore<K> for MemoryStore
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Send + Sync,
{
    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        if !self.namespace_exists(namespace) {
            return Err(StoreError::NotFound(format!("namespace {namespace}")));
        }
        let kind = K::kind(&()).to_string();
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).unwrap())
            .collect())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let key = (kind.clone(), namespace.to_string(), name.to_string());
        let raw = self
            .objects
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{kind} {namespace}/{name}")))?;
        let reads = {
            let mut gets = self.gets.lock().unwrap();
            let count = gets.entry(key).or_insert(0);
            *count += 1;
            *count
        };
        let value = self.observed(&kind, name, &raw, reads);
        serde_json::from_value(value).map_err(|e| StoreError::Other(e.to_string()))
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        if self.fail_create_kind.lock().unwrap().as_deref() == Some(kind.as_str()) {
            return Err(StoreError::Other(format!("injected {kind} create failure")));
        }
        let name = object.name_any();
        let key = (kind.clone(), namespace.to_string(), name.clone());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("{kind} {namespace}/{name}")));
        }
        objects.insert(key, serde_json::to_value(object).unwrap());
        Ok(object.clone())
    }

    async fn patch(&self, namespace: &str, name: &str, ops: &[PatchOp]) -> Result<K, StoreError> {
        *self.patch_calls.lock().unwrap() += 1;
        {
            let mut conflicts = self.conflicts.lock().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(StoreError::Conflict(format!(
                    "{name} was modified, please apply your changes to the latest version"
                )));
            }
        }
        let kind = K::kind(&()).to_string();
        let key = (kind.clone(), namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let value = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{kind} {namespace}/{name}")))?;
        for op in ops {
            apply_replace(value, &op.path, op.value.clone())?;
        }
        serde_json::from_value(value.clone()).map_err(|e| StoreError::Other(e.to_string()))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let kind = K::kind(&()).to_string();
        let key = (kind.clone(), namespace.to_string(), name.to_string());
        self.objects
            .lock()
            .unwrap()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{kind} {namespace}/{name}")))
    }
}

#[async_trait]
impl NamespaceStore for MemoryStore {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        Ok(self.namespaces.lock().unwrap().values().cloned().collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError> {
        self.namespaces
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("namespace {name}")))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, StoreError> {
        let name = namespace.name_any();
        let mut namespaces = self.namespaces.lock().unwrap();
        if namespaces.contains_key(&name) {
            return Err(StoreError::AlreadyExists(format!("namespace {name}")));
        }
        namespaces.insert(name, namespace.clone());
        Ok(namespace.clone())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError> {
        self.namespaces
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(format!("namespace {name}")))?;
        // namespace deletion takes everything in it along
        self.objects
            .lock()
            .unwrap()
            .retain(|(_, ns, _), _| ns != name);
        Ok(())
    }
}

fn apply_replace(doc: &mut Value, path: &str, new: Value) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::Other("empty patch path".into()))?;

    let mut current = doc;
    for segment in parents {
        current = match current {
            Value::Object(map) => map.get_mut(*segment),
            Value::Array(arr) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| arr.get_mut(i)),
            _ => None,
        }
        .ok_or_else(|| StoreError::Other(format!("path {path} not found")))?;
    }

    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), new);
            Ok(())
        }
        Value::Array(arr) => {
            let index = last
                .parse::<usize>()
                .map_err(|_| StoreError::Other(format!("bad array index in {path}")))?;
            let slot = arr
                .get_mut(index)
                .ok_or_else(|| StoreError::Other(format!("path {path} not found")))?;
            *slot = new;
            Ok(())
        }
        _ => Err(StoreError::Other(format!("path {path} not found"))),
    }
}

pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(1),
        timeout: Some(Duration::from_secs(2)),
    }
}

pub fn cloneable_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: Some(
                [(ENABLED.to_string(), "true".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn plain_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Stamps the provenance annotations a cloned object would carry.
pub fn with_provenance<K>(mut object: K, source: &str) -> K
where
    K: Resource<DynamicType = ()>,
{
    let annotations = object
        .meta_mut()
        .annotations
        .get_or_insert_with(BTreeMap::new);
    annotations.insert(SOURCE_NAMESPACE.to_string(), source.to_string());
    annotations.insert(CLONED.to_string(), "true".to_string());
    object
}

pub fn deployment(name: &str, replicas: i32) -> Deployment {
    serde_json::from_value(json!({
        "metadata": { "name": name },
        "spec": {
            "replicas": replicas,
            "selector": { "matchLabels": { "app": name } },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": {
                    "containers": [
                        { "name": "app", "image": format!("{name}:v1") },
                    ],
                },
            },
        },
    }))
    .unwrap()
}

pub fn config_map(name: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(
            [("LOG_LEVEL".to_string(), "debug".to_string())]
                .into_iter()
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn secret(name: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            [(
                "password".to_string(),
                ByteString(b"s3cret".to_vec()),
            )]
            .into_iter()
            .collect(),
        ),
        ..Default::default()
    }
}

pub fn service_account(name: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn cluster_ip_service(name: &str) -> Service {
    serde_json::from_value(json!({
        "metadata": { "name": name },
        "spec": {
            "type": "ClusterIP",
            "clusterIP": "10.96.0.1",
            "selector": { "app": name },
            "ports": [{ "port": 80 }],
        },
    }))
    .unwrap()
}

pub fn load_balancer_service(name: &str) -> Service {
    serde_json::from_value(json!({
        "metadata": { "name": name },
        "spec": {
            "type": "LoadBalancer",
            "selector": { "app": name },
            "ports": [{ "port": 443 }],
        },
    }))
    .unwrap()
}

pub fn cron_job(name: &str) -> CronJob {
    serde_json::from_value(json!({
        "metadata": { "name": name },
        "spec": {
            "schedule": "0 3 * * *",
            "jobTemplate": {
                "spec": {
                    "template": {
                        "spec": {
                            "containers": [
                                { "name": "task", "image": format!("{name}:v1") },
                            ],
                            "restartPolicy": "Never",
                        },
                    },
                },
            },
        },
    }))
    .unwrap()
}
