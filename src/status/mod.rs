pub mod aggregate;
pub mod history;
pub mod model;
pub mod reconciler;

pub use model::{HealthSample, HealthState, Incident, LiveCheckResult, ServiceStatus};
pub use reconciler::SnapshotReconciler;
