//! Download worker pool
//!
//! A single dispatcher drains the broker's queue in FIFO order and runs each
//! job on its own task, holding one of `max_concurrent_jobs` semaphore permits
//! for the lifetime of the job's external process.

pub mod process;
pub mod runner;

pub use process::{ProcessError, ProcessRunner, ProcessSpec, SystemRunner};
pub use runner::{JobError, JobRunner};

use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::queue::JobEnvelope;

/// Spawn the dispatcher. It stops once every broker handle is dropped.
pub fn spawn_pool(
    mut receiver: mpsc::Receiver<JobEnvelope>,
    max_concurrent_jobs: usize,
    runner: Arc<JobRunner>,
) -> JoinHandle<()> {
    let permits = Arc::new(Semaphore::new(max_concurrent_jobs.max(1)));
    info!(max_concurrent_jobs, "Starting worker pool");

    tokio::spawn(async move {
        while let Some(envelope) = receiver.recv().await {
            // Wait for a free slot before taking the next job, keeping FIFO order
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            debug!(seq = envelope.seq, job_id = %envelope.job.id, "Dispatching job");

            let runner = runner.clone();
            tokio::spawn(async move {
                let _permit = permit;
                runner.run(envelope.job).await;
            });
        }
        info!("Job queue closed, worker pool stopping");
    })
}
