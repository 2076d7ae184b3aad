use thiserror::Error;

use super::jobs::JobStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} is already {status}; no further transitions allowed")]
    TerminalState { job_id: String, status: JobStatus },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
