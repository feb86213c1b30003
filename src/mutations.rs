use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::annotations::ensure_mutation_eligible;
use crate::store::{PatchOp, ResourceStore, StoreError};
use crate::{Error, Result};

const CONFLICT_RETRIES: u32 = 5;

/// Bounded retry for single-object patches. Only write conflicts are
/// retried; everything else is returned as-is.
async fn retry_on_conflict<T, F, Fut>(mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut backoff = Duration::from_millis(10);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(StoreError::Conflict(msg)) if attempt < CONFLICT_RETRIES => {
                debug!(attempt, error = %msg, "write conflict, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Replaces the image of one container in a cloned deployment. A no-op if
/// the container already runs the requested image.
pub async fn patch_deployment_image<S: ResourceStore<Deployment>>(
    store: &S,
    namespace: &str,
    deployment: &str,
    container: &str,
    image: &str,
) -> Result<()> {
    let current = store.get(namespace, deployment).await?;
    ensure_mutation_eligible(&current)?;

    let containers = current
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|ps| ps.containers.as_slice())
        .unwrap_or(&[]);
    let index = containers
        .iter()
        .position(|c| c.name == container)
        .ok_or_else(|| Error::ContainerNotFound {
            deployment: deployment.to_string(),
            container: container.to_string(),
        })?;

    if containers[index].image.as_deref() == Some(image) {
        info!(namespace, deployment, container, image, "image already current, skipping patch");
        return Ok(());
    }

    let ops = [PatchOp::replace(
        format!("/spec/template/spec/containers/{index}/image"),
        Value::String(image.to_string()),
    )];
    retry_on_conflict(|| store.patch(namespace, deployment, &ops)).await?;
    info!(namespace, deployment, container, image, "patched deployment image");
    Ok(())
}

/// Replaces the data of a cloned secret. Values are rendered to strings
/// and base64-encoded on the wire; JSON numbers are never rendered in
/// scientific notation.
pub async fn patch_secret_data<S: ResourceStore<Secret>>(
    store: &S,
    namespace: &str,
    secret: &str,
    data: &BTreeMap<String, Value>,
) -> Result<()> {
    let current = store.get(namespace, secret).await?;
    ensure_mutation_eligible(&current)?;

    let encoded: BTreeMap<String, ByteString> = data
        .iter()
        .map(|(k, v)| (k.clone(), ByteString(render_value(v).into_bytes())))
        .collect();

    let ops = [PatchOp::replace("/data", serde_json::to_value(&encoded)?)];
    retry_on_conflict(|| store.patch(namespace, secret, &ops)).await?;
    info!(namespace, secret, "patched secret data");
    Ok(())
}

/// Replaces the data of a cloned config map.
pub async fn patch_config_map_data<S: ResourceStore<ConfigMap>>(
    store: &S,
    namespace: &str,
    config_map: &str,
    data: &BTreeMap<String, String>,
) -> Result<()> {
    let current = store.get(namespace, config_map).await?;
    ensure_mutation_eligible(&current)?;

    let ops = [PatchOp::replace("/data", serde_json::to_value(data)?)];
    retry_on_conflict(|| store.patch(namespace, config_map, &ops)).await?;
    info!(namespace, config_map, "patched config map data");
    Ok(())
}

/// Scales a cloned deployment to one replica (up) or zero (down). A no-op
/// if the deployment is already at the target count.
pub async fn scale_deployment<S: ResourceStore<Deployment>>(
    store: &S,
    namespace: &str,
    deployment: &str,
    up: bool,
) -> Result<()> {
    let current = store.get(namespace, deployment).await?;
    ensure_mutation_eligible(&current)?;

    let desired = if up { 1 } else { 0 };
    let replicas = current.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    if replicas == desired {
        info!(namespace, deployment, replicas, "already at target scale, skipping patch");
        return Ok(());
    }

    let ops = [PatchOp::replace("/spec/replicas", json!(desired))];
    retry_on_conflict(|| store.patch(namespace, deployment, &ops)).await?;
    info!(namespace, deployment, replicas = desired, "scaled deployment");
    Ok(())
}

/// Suspends or resumes a cloned cron job. A no-op if already in the
/// requested state.
pub async fn set_cron_job_suspended<S: ResourceStore<CronJob>>(
    store: &S,
    namespace: &str,
    cron_job: &str,
    suspended: bool,
) -> Result<()> {
    let current = store.get(namespace, cron_job).await?;
    ensure_mutation_eligible(&current)?;

    let currently = current
        .spec
        .as_ref()
        .and_then(|s| s.suspend)
        .unwrap_or(false);
    if currently == suspended {
        info!(namespace, cron_job, suspended, "already in requested state, skipping patch");
        return Ok(());
    }

    let ops = [PatchOp::replace("/spec/suspend", json!(suspended))];
    retry_on_conflict(|| store.patch(namespace, cron_job, &ops)).await?;
    info!(namespace, cron_job, suspended, "updated cron job suspension");
    Ok(())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(u)) => u.to_string(),
            // floats print in positional notation, never scientific
            _ => format!("{}", n.as_f64().unwrap_or_default()),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
