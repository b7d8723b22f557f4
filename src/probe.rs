use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, warn};
use url::Url;

use crate::status::aggregate::{ProbeOutcome, classify_probe};
use crate::status::HealthSample;

/// Direct reachability prober for self-probe mode. In this mode there
/// is no backend; the client collects its own samples.
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
    degraded_threshold: Duration,
}

impl Prober {
    pub fn new(timeout: Duration, degraded_threshold: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            degraded_threshold,
        }
    }

    /// Probes one endpoint and returns the classified sample. Never
    /// fails: an unreachable endpoint is itself a result (major).
    pub async fn probe(&self, name: &str, url: &Url) -> HealthSample {
        let start = Instant::now();
        let outcome = match self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ProbeOutcome::Success {
                latency: start.elapsed(),
            },
            Ok(response) => {
                warn!("{name} returned non-success status {}", response.status());
                ProbeOutcome::HttpError
            }
            Err(e) => {
                warn!("failed to reach {name}: {e}");
                ProbeOutcome::Unreachable
            }
        };

        let latency = start.elapsed();
        let status = classify_probe(outcome, self.degraded_threshold);
        debug!("probe {name}: {status} in {latency:?}");

        HealthSample {
            time: Utc::now(),
            response_time: match outcome {
                ProbeOutcome::Unreachable => 0,
                _ => latency.as_millis() as u64,
            },
            status,
        }
    }
}
