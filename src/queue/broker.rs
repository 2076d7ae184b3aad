use crate::ledger::Job;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is full ({capacity} jobs waiting)")]
    Full { capacity: usize },

    #[error("Job queue is closed")]
    Closed,
}

/// JobEnvelope wraps a queued job with its submission sequence number
#[derive(Clone, Debug)]
pub struct JobEnvelope {
    pub seq: u64,
    pub job: Job,
}

/// JobBroker hands accepted jobs to the worker pool
///
/// 1. The service registers a job, then calls `broker.enqueue(job)`
/// 2. The broker stamps a sequence number and pushes the envelope onto a
///    bounded FIFO channel
/// 3. The pool dispatcher (see [`crate::worker::spawn_pool`]) drains the
///    channel, running at most `max_concurrent_jobs` at a time
///
/// Enqueueing never waits: a full queue is reported back to the submitter.
pub struct JobBroker {
    sender: mpsc::Sender<JobEnvelope>,
    capacity: usize,
    next_seq: AtomicU64,
}

impl JobBroker {
    /// Returns the broker and the receiver the worker pool consumes
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobEnvelope>) {
        let capacity = capacity.max(1);
        info!(capacity, "Creating JobBroker");

        let (sender, receiver) = mpsc::channel(capacity);
        let broker = Self {
            sender,
            capacity,
            next_seq: AtomicU64::new(0),
        };
        (broker, receiver)
    }

    pub fn enqueue(&self, job: Job) -> Result<u64, QueueError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let job_id = job.id.clone();

        match self.sender.try_send(JobEnvelope { seq, job }) {
            Ok(()) => {
                debug!(seq, job_id = %job_id, "Job queued");
                Ok(seq)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(seq, job_id = %job_id, capacity = self.capacity, "Job queue full");
                Err(QueueError::Full {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(seq, job_id = %job_id, "Worker pool gone, job not delivered");
                Err(QueueError::Closed)
            }
        }
    }

    /// Jobs accepted but not yet picked up by the pool
    pub fn pending(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    /// True while the worker pool is still consuming
    pub fn health_check(&self) -> bool {
        !self.sender.is_closed()
    }
}
