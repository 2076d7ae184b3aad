//! Per-job status feed
//!
//! A producer task polls the job registry and publishes a `status=..|message=..`
//! line into a `watch` channel. The channel holds one value, so a subscriber
//! that falls behind only ever sees the newest line. The producer stops when
//! the job is terminal, when the job is unknown, or when the subscriber is gone;
//! dropping the sender then ends the stream after its last value.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::ledger::{Job, JobRegistry};

pub const UNKNOWN_STATUS: &str = "UNKNOWN";
const UNKNOWN_MESSAGE: &str = "job not found";

/// Wire form of one status observation
pub fn status_line(status: &str, message: &str) -> String {
    format!("status={status}|message={message}")
}

fn render(job: Option<&Job>) -> String {
    match job {
        Some(job) => status_line(job.status.as_str(), &job.message),
        None => status_line(UNKNOWN_STATUS, UNKNOWN_MESSAGE),
    }
}

/// Builds status feeds over a shared [`JobRegistry`]
#[derive(Clone)]
pub struct StatusNotifier {
    registry: Arc<JobRegistry>,
    interval: Duration,
}

impl StatusNotifier {
    pub fn new(registry: Arc<JobRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Finite stream of status lines for `job_id`
    pub async fn subscribe(&self, job_id: &str) -> WatchStream<String> {
        let job = self.registry.get(job_id).await;
        let (tx, rx) = watch::channel(render(job.as_ref()));

        match job {
            Some(job) if !job.status.is_terminal() => {
                tokio::spawn(produce(
                    self.registry.clone(),
                    job.id,
                    self.interval,
                    tx,
                ));
            }
            // one value, then the sender drops and the stream ends
            _ => debug!(job_id, "Status feed needs no producer"),
        }

        WatchStream::new(rx)
    }
}

async fn produce(
    registry: Arc<JobRegistry>,
    job_id: String,
    interval: Duration,
    tx: watch::Sender<String>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately and the initial value is already sent
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(job_id = %job_id, "Status subscriber gone");
                return;
            }
            _ = ticker.tick() => {}
        }

        let job = registry.get(&job_id).await;
        let line = render(job.as_ref());
        tx.send_if_modified(|current| {
            if *current == line {
                return false;
            }
            *current = line;
            true
        });

        if job.is_none_or(|job| job.status.is_terminal()) {
            debug!(job_id = %job_id, "Status feed finished");
            return;
        }
    }
}
