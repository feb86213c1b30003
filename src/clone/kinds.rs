use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::ObjectMeta;

use crate::annotations::{
    SOURCE_CONFIG_MAP, SOURCE_CRON_JOB, SOURCE_DEPLOYMENT, SOURCE_HORIZONTAL_POD_AUTOSCALER,
    SOURCE_INGRESS, SOURCE_JOB, SOURCE_POD_DISRUPTION_BUDGET, SOURCE_SECRET, SOURCE_SERVICE,
    SOURCE_SERVICE_ACCOUNT, SOURCE_STATEFUL_SET,
};

/// How one resource kind is cloned: which source-name annotation it gets,
/// how its payload is copied into a fresh object, and how (if at all) its
/// rollout is observed.
pub(crate) struct KindCloner<K> {
    pub source_annotation: &'static str,
    /// Builds a fresh object carrying only the source payload. `None`
    /// excludes the object from cloning entirely.
    pub prepare: fn(&K) -> Option<K>,
    pub readiness: Option<ReadinessCheck<K>>,
}

pub(crate) struct ReadinessCheck<K> {
    pub is_ready: fn(&K) -> bool,
    pub failure: fn(&K) -> Option<String>,
}

pub(crate) fn config_map() -> KindCloner<ConfigMap> {
    KindCloner {
        source_annotation: SOURCE_CONFIG_MAP,
        prepare: |cm| {
            Some(ConfigMap {
                data: cm.data.clone(),
                binary_data: cm.binary_data.clone(),
                immutable: cm.immutable,
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn service_account() -> KindCloner<ServiceAccount> {
    KindCloner {
        source_annotation: SOURCE_SERVICE_ACCOUNT,
        // service accounts keep their own annotations (workload identity
        // bindings live there); provenance is merged in on top
        prepare: |sa| {
            Some(ServiceAccount {
                metadata: ObjectMeta {
                    annotations: sa.metadata.annotations.clone(),
                    ..Default::default()
                },
                automount_service_account_token: sa.automount_service_account_token,
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn secret() -> KindCloner<Secret> {
    KindCloner {
        source_annotation: SOURCE_SECRET,
        prepare: |s| {
            Some(Secret {
                data: s.data.clone(),
                type_: s.type_.clone(),
                immutable: s.immutable,
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn deployment() -> KindCloner<Deployment> {
    KindCloner {
        source_annotation: SOURCE_DEPLOYMENT,
        prepare: |d| {
            Some(Deployment {
                spec: d.spec.clone(),
                ..Default::default()
            })
        },
        readiness: Some(ReadinessCheck {
            is_ready: deployment_ready,
            failure: deployment_replica_failure,
        }),
    }
}

pub(crate) fn service() -> KindCloner<Service> {
    KindCloner {
        source_annotation: SOURCE_SERVICE,
        prepare: |svc| {
            let mut spec = svc.spec.clone()?;
            // LoadBalancer services would provision cloud resources; only
            // cluster-internal service types are cloned
            if !matches!(
                spec.type_.as_deref().unwrap_or("ClusterIP"),
                "ClusterIP" | "NodePort" | "ExternalName"
            ) {
                return None;
            }
            // the copy gets fresh network identity
            spec.cluster_ip = None;
            spec.cluster_ips = None;
            spec.external_ips = None;
            spec.external_name = None;
            spec.load_balancer_ip = None;
            Some(Service {
                spec: Some(spec),
                ..Default::default()
            })
        },
        readiness: Some(ReadinessCheck {
            is_ready: service_ready,
            failure: |_| None,
        }),
    }
}

pub(crate) fn cron_job() -> KindCloner<CronJob> {
    KindCloner {
        source_annotation: SOURCE_CRON_JOB,
        prepare: |cj| {
            Some(CronJob {
                spec: cj.spec.clone(),
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn job() -> KindCloner<Job> {
    KindCloner {
        source_annotation: SOURCE_JOB,
        prepare: |j| {
            Some(Job {
                spec: j.spec.clone(),
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn stateful_set() -> KindCloner<StatefulSet> {
    KindCloner {
        source_annotation: SOURCE_STATEFUL_SET,
        prepare: |ss| {
            Some(StatefulSet {
                spec: ss.spec.clone(),
                ..Default::default()
            })
        },
        readiness: Some(ReadinessCheck {
            is_ready: stateful_set_ready,
            failure: stateful_set_update_failure,
        }),
    }
}

pub(crate) fn ingress() -> KindCloner<Ingress> {
    KindCloner {
        source_annotation: SOURCE_INGRESS,
        prepare: |ing| {
            Some(Ingress {
                spec: ing.spec.clone(),
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn pod_disruption_budget() -> KindCloner<PodDisruptionBudget> {
    KindCloner {
        source_annotation: SOURCE_POD_DISRUPTION_BUDGET,
        prepare: |pdb| {
            Some(PodDisruptionBudget {
                spec: pdb.spec.clone(),
                ..Default::default()
            })
        },
        readiness: None,
    }
}

pub(crate) fn horizontal_pod_autoscaler() -> KindCloner<HorizontalPodAutoscaler> {
    KindCloner {
        source_annotation: SOURCE_HORIZONTAL_POD_AUTOSCALER,
        prepare: |hpa| {
            Some(HorizontalPodAutoscaler {
                spec: hpa.spec.clone(),
                ..Default::default()
            })
        },
        readiness: None,
    }
}

fn deployment_ready(deployment: &Deployment) -> bool {
    let want = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let have = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    have == want
}

fn deployment_replica_failure(deployment: &Deployment) -> Option<String> {
    let conditions = deployment.status.as_ref()?.conditions.as_ref()?;
    conditions
        .iter()
        .find(|c| c.type_ == "ReplicaFailure" && c.status == "True")
        .map(|c| {
            c.reason
                .clone()
                .unwrap_or_else(|| "replica failure".to_string())
        })
}

fn service_ready(service: &Service) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .is_some_and(|ip| !ip.is_empty())
}

fn stateful_set_ready(stateful_set: &StatefulSet) -> bool {
    let want = stateful_set
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let have = stateful_set
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    have == want
}

// Heuristic: a stuck update leaves updateRevision ahead of currentRevision.
fn stateful_set_update_failure(stateful_set: &StatefulSet) -> Option<String> {
    let status = stateful_set.status.as_ref()?;
    if status.update_revision == status.current_revision {
        return None;
    }
    let reason = status.conditions.as_ref().and_then(|conditions| {
        conditions
            .iter()
            .find(|c| c.status != "True")
            .and_then(|c| c.reason.clone())
    });
    Some(reason.unwrap_or_else(|| "update revision does not match current revision".to_string()))
}
