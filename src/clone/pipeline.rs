use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use serde::Serialize;
use tracing::{info, warn};

use crate::poll::PollSettings;
use crate::store::{NamespaceStore, ResourceStore};
use crate::{Error, Result};

use super::kinds;
use super::namespace::{create_namespace, remove_namespace};
use super::stage::{clone_kind, StageReport};

/// Everything the clone pipeline needs from the cluster store.
pub trait ClusterStore:
    NamespaceStore
    + ResourceStore<ConfigMap>
    + ResourceStore<ServiceAccount>
    + ResourceStore<Secret>
    + ResourceStore<Deployment>
    + ResourceStore<Service>
    + ResourceStore<CronJob>
    + ResourceStore<Job>
    + ResourceStore<StatefulSet>
    + ResourceStore<Ingress>
    + ResourceStore<PodDisruptionBudget>
    + ResourceStore<HorizontalPodAutoscaler>
{
}

impl<T> ClusterStore for T where
    T: NamespaceStore
        + ResourceStore<ConfigMap>
        + ResourceStore<ServiceAccount>
        + ResourceStore<Secret>
        + ResourceStore<Deployment>
        + ResourceStore<Service>
        + ResourceStore<CronJob>
        + ResourceStore<Job>
        + ResourceStore<StatefulSet>
        + ResourceStore<Ingress>
        + ResourceStore<PodDisruptionBudget>
        + ResourceStore<HorizontalPodAutoscaler>
{
}

#[derive(Clone, Debug, Serialize)]
pub struct CloneReport {
    pub stages: Vec<StageReport>,
}

/// Clones every workload resource in `source` into `target`.
///
/// The target namespace is created first (idempotently) with provenance
/// stamped, then the eleven kinds are cloned strictly in order. The first
/// stage failure stops the pipeline, the target namespace is deleted as
/// one coarse compensating action, and the original error is returned; a
/// rollback failure is logged but never masks it.
pub async fn clone_namespace<S: ClusterStore>(
    store: &S,
    poll: &PollSettings,
    source: &str,
    target: &str,
) -> Result<CloneReport> {
    if source == target {
        return Err(Error::SameNamespace);
    }

    info!(source, target, "cloning namespace");
    create_namespace(store, source, target).await?;

    match run_stages(store, poll, source, target).await {
        Ok(report) => {
            info!(source, target, "namespace cloned");
            Ok(report)
        }
        Err(err) => {
            warn!(source, target, error = %err, "clone failed, removing target namespace");
            if let Err(rollback) = remove_namespace(store, poll, target).await {
                warn!(namespace = target, error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

// The order is a hand-picked total order: later kinds may reference
// earlier ones by name (a Service selects Deployment pods, an HPA targets
// a Deployment). No dependency graph is computed.
async fn run_stages<S: ClusterStore>(
    store: &S,
    poll: &PollSettings,
    source: &str,
    target: &str,
) -> Result<CloneReport> {
    let mut stages = Vec::with_capacity(11);
    stages.push(clone_kind(store, &kinds::config_map(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::service_account(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::secret(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::deployment(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::service(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::cron_job(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::job(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::stateful_set(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::ingress(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::pod_disruption_budget(), poll, source, target).await?);
    stages.push(clone_kind(store, &kinds::horizontal_pod_autoscaler(), poll, source, target).await?);
    Ok(CloneReport { stages })
}
