use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::{Resource, ResourceExt};

use crate::{Error, Result};

/// Marks a namespace as eligible to be cloned from.
pub static ENABLED: &str = "cloner.k8s.io/enabled";

/// Points a cloned object (or namespace) back at the namespace it came from.
pub static SOURCE_NAMESPACE: &str = "cloner.k8s.io/source-namespace";

/// Marks an object as having been produced by the clone pipeline. Only
/// objects carrying this annotation may be mutated through this system.
pub static CLONED: &str = "cloner.k8s.io/cloned";

pub static SOURCE_CONFIG_MAP: &str = "cloner.k8s.io/source-configmap";
pub static SOURCE_SECRET: &str = "cloner.k8s.io/source-secret";
pub static SOURCE_SERVICE_ACCOUNT: &str = "cloner.k8s.io/source-serviceaccount";
pub static SOURCE_DEPLOYMENT: &str = "cloner.k8s.io/source-deployment";
pub static SOURCE_SERVICE: &str = "cloner.k8s.io/source-service";
pub static SOURCE_CRON_JOB: &str = "cloner.k8s.io/source-cronjob";
pub static SOURCE_JOB: &str = "cloner.k8s.io/source-job";
pub static SOURCE_STATEFUL_SET: &str = "cloner.k8s.io/source-statefulset";
pub static SOURCE_INGRESS: &str = "cloner.k8s.io/source-ingress";
pub static SOURCE_POD_DISRUPTION_BUDGET: &str = "cloner.k8s.io/source-poddisruptionbudget";
pub static SOURCE_HORIZONTAL_POD_AUTOSCALER: &str = "cloner.k8s.io/source-horizontalpodautoscaler";

fn is_true(value: &str) -> bool {
    value == "true" || value == "True"
}

/// The annotation set stamped on a cloned namespace at creation time.
pub fn provenance(source_namespace: &str) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    annotations.insert(SOURCE_NAMESPACE.to_string(), source_namespace.to_string());
    annotations.insert(CLONED.to_string(), "true".to_string());
    annotations
}

/// True iff the namespace carries the enablement annotation with a truthy
/// value, marking it as a permitted clone source.
pub fn is_source_eligible(namespace: &Namespace) -> bool {
    namespace
        .annotations()
        .get(ENABLED)
        .is_some_and(|v| is_true(v))
}

/// True iff the namespace was itself produced by a clone.
pub fn is_clone_result(namespace: &Namespace) -> bool {
    namespace
        .annotations()
        .get(CLONED)
        .is_some_and(|v| is_true(v))
}

/// Gate for mutation operations: the resource must carry the clone
/// provenance annotation, otherwise the caller gets an authorization error
/// and must not touch the object.
pub fn ensure_mutation_eligible<K>(object: &K) -> Result<()>
where
    K: Resource<DynamicType = ()>,
{
    if object.annotations().get(CLONED).is_some_and(|v| is_true(v)) {
        Ok(())
    } else {
        Err(Error::NotEligible {
            kind: K::kind(&()).to_string(),
            name: object.name_any(),
        })
    }
}
