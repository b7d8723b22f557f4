use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::{Incident, ServiceStatus};

/// Fixed namespace prefix for every cached artifact.
const KEY_PREFIX: &str = "statuswatch";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheStamp {
    saved_at: DateTime<Utc>,
}

/// Best-effort durability for the last known snapshot across restarts.
/// One file per artifact (services, incidents, write stamp), all under
/// the same key prefix in a single directory.
///
/// Reads happen only at startup. A stale or unreadable cache falls
/// back to the caller's defaults; nothing here ever propagates an
/// error to the render path.
pub struct LocalCache {
    dir: PathBuf,
    freshness: Duration,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>, freshness: Duration) -> Self {
        Self {
            dir: dir.into(),
            freshness,
        }
    }

    fn entry(&self, artifact: &str) -> PathBuf {
        self.dir.join(format!("{KEY_PREFIX}.{artifact}.json"))
    }

    /// Persists the current snapshot plus a write stamp.
    pub fn store(
        &self,
        services: &[ServiceStatus],
        incidents: &[Incident],
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        write_json(&self.entry("services"), services)?;
        write_json(&self.entry("incidents"), incidents)?;
        write_json(
            &self.entry("stamp"),
            &CacheStamp {
                saved_at: Utc::now(),
            },
        )?;
        Ok(())
    }

    /// Loads the cached snapshot if present, readable, and written
    /// within the freshness window, along with the time it was
    /// written. Anything else returns `None`: stale data presented as
    /// current is worse than the defaults.
    pub fn load(
        &self,
        now: DateTime<Utc>,
    ) -> Option<(Vec<ServiceStatus>, Vec<Incident>, DateTime<Utc>)> {
        let stamp: CacheStamp = read_json(&self.entry("stamp"))?;
        let age = now.signed_duration_since(stamp.saved_at);
        if age.num_milliseconds() < 0 || age.to_std().ok()? > self.freshness {
            debug!("cached snapshot is stale (written {})", stamp.saved_at);
            return None;
        }

        let services = read_json(&self.entry("services"))?;
        let incidents = read_json(&self.entry("incidents"))?;
        Some((services, incidents, stamp.saved_at))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CacheError> {
    let encoded = serde_json::to_vec(value)?;
    std::fs::write(path, encoded)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("failed to read cache entry {path:?}: {e}");
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("corrupt cache entry {path:?}: {e}");
            None
        }
    }
}
