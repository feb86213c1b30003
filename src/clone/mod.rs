mod kinds;
mod namespace;
mod pipeline;
mod stage;

pub use pipeline::{clone_namespace, CloneReport, ClusterStore};
pub use stage::StageReport;
