use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;

use crate::api::StatusApi;
use crate::cache::LocalCache;
use crate::config::{Mode, StatuswatchConfig};
use crate::probe::Prober;
use crate::state::StatusSnapshot;
use crate::status::{Incident, LiveCheckResult, ServiceStatus, SnapshotReconciler};

/// State behind the scheduler's lock. All mutation funnels through
/// these methods; every failure path preserves whatever is already
/// here (stale beats missing on a status page).
struct SharedState {
    reconciler: SnapshotReconciler,
    incidents: Vec<Incident>,
    loading: bool,
    last_updated: DateTime<Utc>,
    consecutive_failures: u32,
}

impl SharedState {
    /// `seeded_at` is the write time of the cache snapshot the state
    /// was seeded from, when there is one. Data restored from disk
    /// must not report itself newer than it is.
    fn new(
        services: Vec<ServiceStatus>,
        incidents: Vec<Incident>,
        history_window: usize,
        seeded_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            reconciler: SnapshotReconciler::new(services, history_window),
            incidents,
            loading: true,
            last_updated: seeded_at.unwrap_or_else(Utc::now),
            consecutive_failures: 0,
        }
    }

    fn apply_status(&mut self, services: Vec<ServiceStatus>) {
        self.reconciler.apply_snapshot(services);
        self.last_updated = Utc::now();
        self.consecutive_failures = 0;
    }

    fn apply_incidents(&mut self, mut incidents: Vec<Incident>) {
        for incident in &mut incidents {
            incident.sort_updates();
        }
        self.incidents = incidents;
        self.consecutive_failures = 0;
    }

    fn apply_live(&mut self, results: &[LiveCheckResult]) {
        self.reconciler.apply_live_check(results);
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            services: self.reconciler.services().to_vec(),
            incidents: self.incidents.clone(),
            loading: self.loading,
            last_updated: self.last_updated,
            consecutive_failures: self.consecutive_failures,
        }
    }
}

struct SchedulerInner {
    config: StatuswatchConfig,
    api: Option<StatusApi>,
    prober: Option<Prober>,
    cache: Option<LocalCache>,
    state: Mutex<SharedState>,
    watch_tx: watch::Sender<StatusSnapshot>,
}

impl SchedulerInner {
    fn publish(&self, state: &SharedState) {
        // Receivers may come and go; a send with none listening is fine.
        let _ = self.watch_tx.send(state.snapshot());
    }

    fn persist(&self, state: &SharedState) {
        let Some(cache) = &self.cache else { return };
        if let Err(e) = cache.store(state.reconciler.services(), &state.incidents) {
            warn!("failed to persist snapshot cache: {e}");
        }
    }

    /// Authoritative fetch: the backend's stored history replaces ours
    /// wholesale. On any failure the previous snapshot stays visible.
    async fn refresh_status(&self) {
        let Some(api) = &self.api else { return };
        match api.fetch_status().await {
            Ok(services) => {
                let mut state = self.state.lock().await;
                state.apply_status(services);
                self.persist(&state);
                self.publish(&state);
            }
            Err(e) => {
                error!("failed to fetch cached status: {e}");
                let mut state = self.state.lock().await;
                state.record_failure();
                self.publish(&state);
            }
        }
    }

    async fn refresh_incidents(&self) {
        let Some(api) = &self.api else { return };
        match api.fetch_incidents().await {
            Ok(incidents) => {
                let mut state = self.state.lock().await;
                state.apply_incidents(incidents);
                self.persist(&state);
                self.publish(&state);
            }
            Err(e) => {
                error!("failed to fetch incidents: {e}");
                let mut state = self.state.lock().await;
                state.record_failure();
                self.publish(&state);
            }
        }
    }

    /// Triggers a backend-side probe and applies the current-state
    /// result. History stays untouched here; the backend appends the
    /// probe to its own ledger, so we re-fetch the authoritative
    /// snapshot after a short delay to pick that up.
    async fn live_check(&self) {
        let Some(api) = &self.api else { return };
        match api.live_check().await {
            Ok(results) => {
                {
                    let mut state = self.state.lock().await;
                    state.apply_live(&results);
                    self.publish(&state);
                }
                tokio::time::sleep(Duration::from_secs(self.config.live_check.refetch_delay))
                    .await;
                self.refresh_status().await;
            }
            Err(e) => {
                error!("live check failed: {e}");
                let mut state = self.state.lock().await;
                state.record_failure();
                self.publish(&state);
            }
        }
    }

    /// Self-probe mode: one sample per tracked service per cycle,
    /// appended locally since there is no backend ledger.
    async fn probe_cycle(&self) {
        let Some(prober) = &self.prober else { return };
        let mut samples = Vec::with_capacity(self.config.services.len());
        for entry in &self.config.services {
            let Some(url) = &entry.url else { continue };
            samples.push((entry.name.clone(), prober.probe(&entry.name, url).await));
        }

        let mut state = self.state.lock().await;
        for (name, sample) in samples {
            state.reconciler.apply_probe_sample(&name, sample);
        }
        state.last_updated = Utc::now();
        state.consecutive_failures = 0;
        self.persist(&state);
        self.publish(&state);
    }

    async fn clear_loading(&self) {
        let mut state = self.state.lock().await;
        state.loading = false;
        self.publish(&state);
    }
}

/// Drives the periodic fetch/probe cycle and owns the published state.
///
/// The two timers are independent and never wait for in-flight work:
/// each tick spawns its fetch, overlapping requests are allowed, and
/// each result applies when it resolves (last-applied-wins). With four
/// services on a multi-second cadence the overlap is harmless; at
/// higher volume it would need backpressure this deliberately does not
/// have.
pub struct PollingScheduler {
    inner: Arc<SchedulerInner>,
    cancel_tx: mpsc::Sender<()>,
    cancel_rx: Mutex<mpsc::Receiver<()>>,
}

impl PollingScheduler {
    /// Builds the scheduler seeded with the given state (defaults, or
    /// a fresh cache snapshot). Returns the receiver the render layer
    /// subscribes to.
    pub fn new(
        config: StatuswatchConfig,
        api: Option<StatusApi>,
        prober: Option<Prober>,
        cache: Option<LocalCache>,
        services: Vec<ServiceStatus>,
        incidents: Vec<Incident>,
        seeded_at: Option<DateTime<Utc>>,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let state = SharedState::new(services, incidents, config.history_window, seeded_at);
        let (watch_tx, watch_rx) = watch::channel(state.snapshot());
        let (cancel_tx, cancel_rx) = mpsc::channel(1);

        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                config,
                api,
                prober,
                cache,
                state: Mutex::new(state),
                watch_tx,
            }),
            cancel_tx,
            cancel_rx: Mutex::new(cancel_rx),
        };
        (scheduler, watch_rx)
    }

    pub async fn cancel(&self) {
        let _ = self.cancel_tx.send(()).await;
    }

    /// Runs until cancelled. Initial load first (loading clears only
    /// once both initial fetches are done), then the repeating timers.
    pub async fn run(&self) {
        let inner = &self.inner;

        info!("starting initial load");
        match inner.config.mode {
            Mode::Backend => {
                tokio::join!(inner.refresh_status(), inner.refresh_incidents());
            }
            Mode::SelfProbe => {
                inner.probe_cycle().await;
            }
        }
        inner.clear_loading().await;
        info!("initial load complete");

        let mut tasks: JoinSet<()> = JoinSet::new();

        // One-shot delayed live check, kept in the task set so
        // cancellation aborts it with everything else.
        if inner.config.mode == Mode::Backend && inner.config.live_check.enabled {
            let delayed = Arc::clone(inner);
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_secs(delayed.config.live_check.initial_delay))
                    .await;
                delayed.live_check().await;
            });
        }

        let mut status_interval = tokio::time::interval(inner.config.status_interval());
        let mut incident_interval = tokio::time::interval(inner.config.incident_interval());
        // The first tick of a tokio interval completes immediately;
        // the initial load already covered it.
        status_interval.tick().await;
        incident_interval.tick().await;

        let mut cancel_rx = self.cancel_rx.lock().await;

        loop {
            tokio::select! {
                _ = status_interval.tick() => {
                    let inner = Arc::clone(&self.inner);
                    tasks.spawn(async move {
                        match inner.config.mode {
                            Mode::Backend if inner.config.live_check.enabled => {
                                inner.live_check().await;
                            }
                            Mode::Backend => inner.refresh_status().await,
                            Mode::SelfProbe => inner.probe_cycle().await,
                        }
                    });
                }
                _ = incident_interval.tick(), if inner.config.mode == Mode::Backend => {
                    let inner = Arc::clone(&self.inner);
                    tasks.spawn(async move {
                        inner.refresh_incidents().await;
                    });
                }
                Some(_) = tasks.join_next() => {}
                _ = cancel_rx.recv() => {
                    info!("scheduler cancelled, aborting in-flight work");
                    tasks.shutdown().await;
                    break;
                }
            }
        }
    }
}
