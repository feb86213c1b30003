use std::collections::BTreeMap;

use kube::{Resource, ResourceExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::annotations::{CLONED, SOURCE_NAMESPACE};
use crate::poll::{wait_until_ready, PollSettings};
use crate::store::{ResourceStore, StoreError};
use crate::{Error, Result};

use super::kinds::KindCloner;

/// What one pipeline stage did for its kind. `skipped` counts objects
/// already present in the target; `excluded` counts objects the kind's
/// policy refuses to clone at all.
#[derive(Clone, Debug, Serialize)]
pub struct StageReport {
    pub kind: String,
    pub created: u32,
    pub skipped: u32,
    pub excluded: u32,
}

/// The generic pipeline stage: list the source namespace, skip objects
/// already present in the target, stamp provenance, create, then wait for
/// readiness (or just confirm existence for kinds without a rollout
/// signal). Any create failure or readiness failure aborts the stage.
pub(crate) async fn clone_kind<K, S>(
    store: &S,
    cloner: &KindCloner<K>,
    poll: &PollSettings,
    source: &str,
    target: &str,
) -> Result<StageReport>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync,
    S: ResourceStore<K>,
{
    let kind = K::kind(&()).to_string();
    let mut report = StageReport {
        kind: kind.clone(),
        created: 0,
        skipped: 0,
        excluded: 0,
    };

    let objects = match store.list(source).await {
        Ok(objects) => objects,
        // a source namespace without instances of this kind is zero work
        Err(StoreError::NotFound(_)) => {
            debug!(kind = %kind, namespace = source, "nothing to clone");
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    };

    for object in &objects {
        let name = object.name_any();

        match store.get(target, &name).await {
            Ok(_) => {
                info!(kind = %kind, name = %name, namespace = target, "already exists, skipping");
                report.skipped += 1;
                continue;
            }
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let Some(mut copy) = (cloner.prepare)(object) else {
            debug!(kind = %kind, name = %name, "excluded from cloning");
            report.excluded += 1;
            continue;
        };

        let meta = copy.meta_mut();
        meta.name = Some(name.clone());
        meta.namespace = Some(target.to_string());
        let stamped = meta.annotations.get_or_insert_with(BTreeMap::new);
        stamped.insert(SOURCE_NAMESPACE.to_string(), source.to_string());
        stamped.insert(CLONED.to_string(), "true".to_string());
        stamped.insert(cloner.source_annotation.to_string(), name.clone());

        store.create(target, &copy).await?;

        match &cloner.readiness {
            Some(check) => {
                let what = format!("{kind} {target}/{name}");
                wait_until_ready(
                    poll,
                    &what,
                    || async { store.get(target, &name).await.map_err(Error::from) },
                    check.is_ready,
                    check.failure,
                )
                .await?;
                info!(kind = %kind, name = %name, namespace = target, "ready");
            }
            None => match store.get(target, &name).await {
                Ok(_) => {
                    debug!(kind = %kind, name = %name, namespace = target, "created");
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(Error::CreatedObjectMissing {
                        kind: kind.clone(),
                        name: name.clone(),
                        namespace: target.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            },
        }

        report.created += 1;
    }

    Ok(report)
}
