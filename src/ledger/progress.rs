use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::parser::{ProgressUpdate, Stage};

/// How long a finished snapshot stays readable after its last update
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

const IDLE_SPEED: &str = "0 KiB/s";
const UNKNOWN_ETA: &str = "Unknown";

/// Latest progress reading for one job, replaced wholesale on each update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub percentage: u8,
    /// Coarse phase: `Starting`, `Downloading`, `Merging`, `Completed`, `Error: …`
    pub status: String,
    pub speed: String,
    pub eta: String,
    pub last_update: DateTime<Utc>,
}

impl ProgressSnapshot {
    pub fn from_update(job_id: &str, update: &ProgressUpdate) -> Self {
        Self {
            job_id: job_id.to_string(),
            percentage: update.percent,
            status: update.stage.label().to_string(),
            speed: update.speed.clone().unwrap_or_else(|| IDLE_SPEED.to_string()),
            eta: update.eta.clone().unwrap_or_else(|| UNKNOWN_ETA.to_string()),
            last_update: Utc::now(),
        }
    }

    pub fn starting(job_id: &str) -> Self {
        Self::from_update(job_id, &ProgressUpdate::new(0, Stage::Starting))
    }

    pub fn completed(job_id: &str) -> Self {
        Self {
            eta: "00:00".to_string(),
            ..Self::from_update(job_id, &ProgressUpdate::new(100, Stage::Completed))
        }
    }

    /// An error reading keeps the last known percentage
    pub fn failed(job_id: &str, percentage: u8, reason: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            percentage,
            status: format!("Error: {reason}"),
            speed: IDLE_SPEED.to_string(),
            eta: UNKNOWN_ETA.to_string(),
            last_update: Utc::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.percentage >= 100
    }
}

/// Concurrent map of job id → latest [`ProgressSnapshot`]
///
/// Lifetime is independent of the job registry: a snapshot at 100% whose
/// last update is older than the grace period is removed by the read that
/// observes it. That read still returns the snapshot.
#[derive(Debug)]
pub struct ProgressStore {
    entries: RwLock<HashMap<String, ProgressSnapshot>>,
    grace: TimeDelta,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl ProgressStore {
    pub fn new(grace: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            grace: TimeDelta::from_std(grace).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Insert or replace the snapshot for `snapshot.job_id`
    pub async fn update(&self, snapshot: ProgressSnapshot) {
        self.entries
            .write()
            .await
            .insert(snapshot.job_id.clone(), snapshot);
    }

    pub async fn get(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.get_at(job_id, Utc::now()).await
    }

    /// Last known percentage without applying the cleanup policy
    pub async fn percentage(&self, job_id: &str) -> Option<u8> {
        self.entries.read().await.get(job_id).map(|s| s.percentage)
    }

    pub async fn remove(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.entries.write().await.remove(job_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub(crate) async fn get_at(&self, job_id: &str, now: DateTime<Utc>) -> Option<ProgressSnapshot> {
        let snapshot = self.entries.read().await.get(job_id).cloned()?;

        if snapshot.is_finished() && now.signed_duration_since(snapshot.last_update) > self.grace {
            let mut entries = self.entries.write().await;
            // Only drop the reading we judged stale, not a newer one written meanwhile
            if entries
                .get(job_id)
                .is_some_and(|current| current.last_update == snapshot.last_update)
            {
                entries.remove(job_id);
                debug!(job_id, "Expired finished progress snapshot");
            }
        }

        Some(snapshot)
    }
}
