use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use tracing::{debug, info};

use crate::annotations::provenance;
use crate::poll::{wait_until_ready, PollSettings};
use crate::store::{NamespaceStore, StoreError};
use crate::{Error, Result};

/// Creates the target namespace with provenance stamped. A namespace that
/// already exists is reused as-is.
pub(crate) async fn create_namespace<S: NamespaceStore>(
    store: &S,
    source: &str,
    target: &str,
) -> Result<()> {
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(target.to_string()),
            annotations: Some(provenance(source)),
            ..Default::default()
        },
        ..Default::default()
    };
    match store.create_namespace(&namespace).await {
        Ok(_) => {
            info!(namespace = target, "created target namespace");
            Ok(())
        }
        Err(StoreError::AlreadyExists(_)) => {
            debug!(namespace = target, "target namespace already exists");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// The pipeline's single compensating action: delete the target namespace
/// and everything in it, then poll until the namespace object is gone.
pub(crate) async fn remove_namespace<S: NamespaceStore>(
    store: &S,
    poll: &PollSettings,
    name: &str,
) -> Result<()> {
    match store.get_namespace(name).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            debug!(namespace = name, "namespace does not exist, nothing to delete");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    store.delete_namespace(name).await.map_err(Error::from)?;

    wait_until_ready(
        poll,
        &format!("deletion of namespace {name}"),
        || async {
            match store.get_namespace(name).await {
                Ok(ns) => Ok(Some(ns)),
                Err(StoreError::NotFound(_)) => Ok(None),
                Err(err) => Err(err.into()),
            }
        },
        |ns: &Option<Namespace>| ns.is_none(),
        |_| None,
    )
    .await?;

    info!(namespace = name, "namespace removed");
    Ok(())
}
