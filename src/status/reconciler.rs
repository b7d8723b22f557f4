use log::debug;

use super::history::{append_bounded, derive_uptime};
use super::model::{HealthSample, LiveCheckResult, ServiceStatus};

/// Holds the tracked service set and applies each source of truth to
/// it: authoritative snapshots, live-check results, and (in self-probe
/// mode) locally collected samples.
///
/// Failure never reaches this type. Callers only invoke it with
/// successfully decoded payloads; on any fetch failure the previous
/// state simply stays in place.
#[derive(Debug)]
pub struct SnapshotReconciler {
    services: Vec<ServiceStatus>,
    history_window: usize,
}

impl SnapshotReconciler {
    pub fn new(services: Vec<ServiceStatus>, history_window: usize) -> Self {
        Self {
            services,
            history_window,
        }
    }

    pub fn services(&self) -> &[ServiceStatus] {
        &self.services
    }

    /// Applies an authoritative snapshot. The backend owns history, so
    /// each service's status, response time, uptime, and history are
    /// replaced wholesale; nothing is merged point by point.
    pub fn apply_snapshot(&mut self, snapshot: Vec<ServiceStatus>) {
        debug!("applying authoritative snapshot ({} services)", snapshot.len());
        self.services = snapshot;
    }

    /// Applies live-check results: current status and response time
    /// only, matched by exact name. History is deliberately left
    /// untouched. The backend appends the probe result to its own
    /// ledger; appending here as well would double-count it, so the
    /// scheduler re-fetches the authoritative snapshot shortly after a
    /// live check instead.
    ///
    /// Tracked services with no matching result are unchanged; results
    /// for unknown names are ignored.
    pub fn apply_live_check(&mut self, results: &[LiveCheckResult]) {
        for result in results {
            let Some(service) = self.services.iter_mut().find(|s| s.name == result.name) else {
                debug!("live check returned unknown service {:?}", result.name);
                continue;
            };
            service.status = result.status;
            service.response_time = result.response_time;
        }
    }

    /// Self-probe mode only: records one locally collected sample for
    /// the named service. The client is the history ledger here, so
    /// the sample is appended (bounded) and uptime is recomputed.
    pub fn apply_probe_sample(&mut self, name: &str, sample: HealthSample) {
        let Some(service) = self.services.iter_mut().find(|s| s.name == name) else {
            debug!("probe sample for untracked service {name:?}");
            return;
        };
        service.status = sample.status;
        service.response_time = sample.response_time;
        append_bounded(&mut service.history, sample, self.history_window);
        service.uptime = derive_uptime(&service.history);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::model::HealthState;
    use chrono::{TimeZone, Utc};

    fn default_services() -> Vec<ServiceStatus> {
        ["Auth", "API", "Site", "Launcher"]
            .into_iter()
            .map(ServiceStatus::unobserved)
            .collect()
    }

    fn sample(minute: u32, status: HealthState, response_time: u64) -> HealthSample {
        HealthSample {
            time: Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap(),
            response_time,
            status,
        }
    }

    #[test]
    fn test_snapshot_replaces_wholesale() {
        let mut reconciler = SnapshotReconciler::new(default_services(), 90);

        let incoming = vec![ServiceStatus {
            name: "API".into(),
            status: HealthState::Degraded,
            response_time: 450,
            uptime: 98.9,
            history: vec![sample(0, HealthState::Degraded, 450)],
        }];
        reconciler.apply_snapshot(incoming.clone());

        assert_eq!(reconciler.services(), incoming.as_slice());
    }

    #[test]
    fn test_live_check_updates_current_state_only() {
        let mut services = default_services();
        services[1].history = vec![sample(0, HealthState::Operational, 100)];
        services[1].uptime = 100.0;
        let mut reconciler = SnapshotReconciler::new(services, 90);

        reconciler.apply_live_check(&[LiveCheckResult {
            name: "API".into(),
            status: HealthState::Major,
            response_time: 0,
        }]);

        let api = &reconciler.services()[1];
        assert_eq!(api.status, HealthState::Major);
        assert_eq!(api.response_time, 0);
        // History and uptime belong to the authoritative source.
        assert_eq!(api.history.len(), 1);
        assert_eq!(api.uptime, 100.0);
    }

    #[test]
    fn test_live_check_ignores_unknown_and_leaves_unmatched() {
        let mut reconciler = SnapshotReconciler::new(default_services(), 90);

        reconciler.apply_live_check(&[LiveCheckResult {
            name: "Billing".into(),
            status: HealthState::Major,
            response_time: 50,
        }]);

        for service in reconciler.services() {
            assert_eq!(service.status, HealthState::Operational);
        }
    }

    #[test]
    fn test_probe_sample_appends_and_recomputes_uptime() {
        let mut reconciler = SnapshotReconciler::new(default_services(), 3);

        reconciler.apply_probe_sample("Site", sample(0, HealthState::Operational, 80));
        reconciler.apply_probe_sample("Site", sample(1, HealthState::Major, 0));

        let site = &reconciler.services()[2];
        assert_eq!(site.status, HealthState::Major);
        assert_eq!(site.history.len(), 2);
        assert_eq!(site.uptime, 50.0);

        // Window of 3: a fourth sample evicts the first.
        reconciler.apply_probe_sample("Site", sample(2, HealthState::Operational, 90));
        reconciler.apply_probe_sample("Site", sample(3, HealthState::Operational, 90));
        let site = &reconciler.services()[2];
        assert_eq!(site.history.len(), 3);
        assert_eq!(site.history[0].status, HealthState::Major);
    }
}
