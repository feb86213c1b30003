use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("source and target namespaces cannot be the same")]
    SameNamespace,

    #[error("namespace {0} is not enabled as a clone source")]
    SourceNotCloneable(String),

    #[error("{kind} {name} is not annotated for clone operations")]
    NotEligible { kind: String, name: String },

    #[error("{kind} {name} was not found in namespace {namespace} after creation")]
    CreatedObjectMissing {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("{what} failed: {reason}")]
    RolloutFailed { what: String, reason: String },

    #[error("deadline exceeded after {seconds}s waiting for {what}")]
    DeadlineExceeded { what: String, seconds: u64 },

    #[error("container {container} not found in deployment {deployment}")]
    ContainerNotFound {
        deployment: String,
        container: String,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Store(StoreError::NotFound(_)) => "NotFound",
            Error::Store(StoreError::AlreadyExists(_)) => "AlreadyExists",
            Error::Store(StoreError::Conflict(_)) => "Conflict",
            Error::Store(StoreError::Other(_)) => "StoreError",
            Error::Serialization(_) => "SerializationError",
            Error::SameNamespace => "SameNamespace",
            Error::SourceNotCloneable(_) => "SourceNotCloneable",
            Error::NotEligible { .. } => "NotEligible",
            Error::CreatedObjectMissing { .. } => "CreatedObjectMissing",
            Error::RolloutFailed { .. } => "RolloutFailed",
            Error::DeadlineExceeded { .. } => "DeadlineExceeded",
            Error::ContainerNotFound { .. } => "ContainerNotFound",
        }
    }

    /// HTTP status the web layer reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Store(StoreError::NotFound(_)) => 404,
            Error::Store(StoreError::AlreadyExists(_)) => 409,
            Error::Store(StoreError::Conflict(_)) => 409,
            Error::Store(StoreError::Other(_)) => 500,
            Error::Serialization(_) => 500,
            Error::SameNamespace => 400,
            Error::SourceNotCloneable(_) => 400,
            Error::NotEligible { .. } => 400,
            Error::CreatedObjectMissing { .. } => 500,
            Error::RolloutFailed { .. } => 500,
            Error::DeadlineExceeded { .. } => 504,
            Error::ContainerNotFound { .. } => 404,
        }
    }
}

/// Provenance annotation keys and the eligibility gate
pub mod annotations;

/// The namespace clone pipeline
pub mod clone;

/// Gated single-object mutation operations
pub mod mutations;

/// Readiness poller
pub mod poll;

/// Cluster resource store boundary
pub mod store;

/// Log integration
pub mod telemetry;

/// Read-side views over cluster state
pub mod views;

/// HTTP surface
pub mod web;

/// Metrics
mod metrics;

pub use metrics::Metrics;
