use super::model::HealthSample;

/// Appends a sample to a service history and evicts the oldest entries
/// beyond `window`. Appends only; ordering is whatever the caller
/// maintains (ascending by time everywhere in this crate).
pub fn append_bounded(history: &mut Vec<HealthSample>, sample: HealthSample, window: usize) {
    history.push(sample);
    if history.len() > window {
        let excess = history.len() - window;
        history.drain(..excess);
    }
}

/// Uptime percentage over the current window.
///
/// An empty window reports 100: no data is treated as no evidence of
/// downtime, not as unknown.
pub fn derive_uptime(history: &[HealthSample]) -> f64 {
    if history.is_empty() {
        return 100.0;
    }
    let up = history.iter().filter(|s| s.status.counts_as_up()).count();
    100.0 * up as f64 / history.len() as f64
}
