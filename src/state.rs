use chrono::{DateTime, Utc};

use crate::status::aggregate::overall_status;
use crate::status::{HealthState, Incident, ServiceStatus};

/// The application state the render layer consumes, published through
/// a watch channel by the scheduler. One owner, explicit fields,
/// nothing ambient.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub services: Vec<ServiceStatus>,
    pub incidents: Vec<Incident>,
    /// True until the initial status and incident fetches have both
    /// completed (successfully or not).
    pub loading: bool,
    /// Time of the last successful authoritative apply.
    pub last_updated: DateTime<Utc>,
    /// Polls failed since the last success, across both timers. The
    /// core never clears data on failure; this counter is how a render
    /// layer can tell "stale" from "current".
    pub consecutive_failures: u32,
}

impl StatusSnapshot {
    /// Worst status across all tracked services, for the banner.
    pub fn overall(&self) -> HealthState {
        overall_status(&self.services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_reflects_worst_service() {
        let mut snapshot = StatusSnapshot {
            services: vec![
                ServiceStatus::unobserved("Auth"),
                ServiceStatus::unobserved("API"),
            ],
            incidents: Vec::new(),
            loading: false,
            last_updated: Utc::now(),
            consecutive_failures: 0,
        };
        assert_eq!(snapshot.overall(), HealthState::Operational);

        snapshot.services[1].status = HealthState::Degraded;
        assert_eq!(snapshot.overall(), HealthState::Degraded);
    }
}
