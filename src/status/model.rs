use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health classification for a single service or sample.
///
/// Variant order matters: `Ord` is derived, so `max` over a set of
/// states yields the most severe one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Operational,
    Degraded,
    Partial,
    Major,
}

impl HealthState {
    /// Whether this state counts as "up" for the uptime metric.
    /// Degraded is latency trouble, not an outage.
    pub fn counts_as_up(self) -> bool {
        matches!(self, HealthState::Operational | HealthState::Degraded)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthState::Operational => "operational",
            HealthState::Degraded => "degraded",
            HealthState::Partial => "partial",
            HealthState::Major => "major",
        };
        f.write_str(s)
    }
}

/// One recorded health observation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub time: DateTime<Utc>,
    #[serde(rename = "responseTime")]
    pub response_time: u64,
    pub status: HealthState,
}

/// Current state plus rolling history for one tracked service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: HealthState,
    #[serde(rename = "responseTime")]
    pub response_time: u64,
    pub uptime: f64,
    pub history: Vec<HealthSample>,
}

impl ServiceStatus {
    /// A service we have no observations for yet. Optimistic defaults:
    /// operational, 100% uptime, empty history.
    pub fn unobserved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthState::Operational,
            response_time: 0,
            uptime: 100.0,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentState {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentUpdate {
    pub id: i64,
    pub status: IncidentState,
    pub message: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Incident record as served by the backend. Read-only here: replaced
/// wholesale on each fetch, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: IncidentSeverity,
    pub status: IncidentState,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "affectedServices", default)]
    pub affected_services: Vec<String>,
    #[serde(default)]
    pub updates: Vec<IncidentUpdate>,
}

impl Incident {
    /// Display-path sort only: updates ascending by creation time.
    /// The backend sometimes delivers them newest-first.
    pub fn sort_updates(&mut self) {
        self.updates.sort_by_key(|u| u.created_at);
    }
}

/// Live-check result for one service: current state without history.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveCheckResult {
    pub name: String,
    pub status: HealthState,
    #[serde(rename = "responseTime")]
    pub response_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_state_wire_names() {
        let parsed: HealthState = serde_json::from_str("\"degraded\"").unwrap();
        assert_eq!(parsed, HealthState::Degraded);
        assert_eq!(
            serde_json::to_string(&HealthState::Operational).unwrap(),
            "\"operational\""
        );
    }

    #[test]
    fn test_health_state_severity_ordering() {
        assert!(HealthState::Major > HealthState::Partial);
        assert!(HealthState::Partial > HealthState::Degraded);
        assert!(HealthState::Degraded > HealthState::Operational);
    }

    #[test]
    fn test_service_wire_shape() {
        let raw = r#"{
            "name": "API",
            "status": "partial",
            "responseTime": 812,
            "uptime": 97.5,
            "history": [
                { "time": "2026-08-01T10:00:00Z", "responseTime": 120, "status": "operational" }
            ]
        }"#;
        let svc: ServiceStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(svc.name, "API");
        assert_eq!(svc.status, HealthState::Partial);
        assert_eq!(svc.response_time, 812);
        assert_eq!(svc.history.len(), 1);
        assert_eq!(svc.history[0].response_time, 120);
    }

    #[test]
    fn test_incident_updates_sort_ascending() {
        let raw = r#"{
            "id": "inc-7",
            "title": "API latency",
            "description": "Elevated response times",
            "severity": "major",
            "status": "monitoring",
            "createdAt": "2026-08-01T09:00:00Z",
            "updatedAt": "2026-08-01T11:00:00Z",
            "affectedServices": ["API"],
            "updates": [
                { "id": 2, "status": "monitoring", "message": "fix deployed", "createdAt": "2026-08-01T11:00:00Z" },
                { "id": 1, "status": "investigating", "message": "looking", "createdAt": "2026-08-01T09:00:00Z" }
            ]
        }"#;
        let mut incident: Incident = serde_json::from_str(raw).unwrap();
        incident.sort_updates();
        assert_eq!(incident.updates[0].id, 1);
        assert_eq!(incident.updates[1].id, 2);
    }
}
