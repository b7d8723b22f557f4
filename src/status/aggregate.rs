use std::time::Duration;

use super::model::{HealthState, ServiceStatus};

/// Reduces the tracked service set to the single worst status present.
/// Severity order: major > partial > degraded > operational. No
/// weighting by how many services are affected.
pub fn overall_status(services: &[ServiceStatus]) -> HealthState {
    services
        .iter()
        .map(|s| s.status)
        .max()
        .unwrap_or(HealthState::Operational)
}

/// Outcome of one direct reachability probe, before classification.
#[derive(Debug, Clone, Copy)]
pub enum ProbeOutcome {
    /// HTTP response received with a success status code.
    Success { latency: Duration },
    /// HTTP response received with a non-success status code.
    HttpError,
    /// No HTTP response at all (DNS, refused connection, timeout).
    Unreachable,
}

/// Classifies a probe outcome. Used only in self-probe mode; in
/// backend mode the server does this classification.
pub fn classify_probe(outcome: ProbeOutcome, degraded_threshold: Duration) -> HealthState {
    match outcome {
        ProbeOutcome::Success { latency } if latency > degraded_threshold => HealthState::Degraded,
        ProbeOutcome::Success { .. } => HealthState::Operational,
        ProbeOutcome::HttpError => HealthState::Partial,
        ProbeOutcome::Unreachable => HealthState::Major,
    }
}
