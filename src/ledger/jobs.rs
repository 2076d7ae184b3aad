use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Lifecycle edges: `QUEUED → RUNNING → DONE | ERROR`, plus `QUEUED → ERROR`
    /// for jobs that fail before their process starts. Non-terminal states may
    /// re-enter themselves to refresh the message.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Queued) | (Queued, Running) | (Queued, Error)
                | (Running, Running) | (Running, Done) | (Running, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields supplied by the submitter; identity and status are assigned by the registry
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source_url: String,
    pub format_selector: String,
    pub filename_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source_url: String,
    pub format_selector: String,
    pub filename_template: String,
    pub status: JobStatus,
    pub message: String,
    /// Set once the job is `DONE`
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent map of job id → [`Job`]
///
/// Each job has a single writer (the task running its process) and any number
/// of readers. Writes are visible to the next read; nothing is batched.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in the `QUEUED` state and return it
    pub async fn create(&self, new_job: NewJob) -> Job {
        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7().to_string(),
            source_url: new_job.source_url,
            format_selector: new_job.format_selector,
            filename_template: new_job.filename_template,
            status: JobStatus::Queued,
            message: "Queued".to_string(),
            output_path: None,
            created_at: now,
            updated_at: now,
        };

        self.jobs.write().await.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, "Registered job");
        job
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Move a job to `status`, replacing its message.
    ///
    /// Terminal jobs are never modified: the call fails with
    /// [`LedgerError::TerminalState`] and the stored entry is left as it was.
    pub async fn transition(
        &self,
        job_id: &str,
        status: JobStatus,
        message: impl Into<String>,
    ) -> Result<Job> {
        self.apply(job_id, status, message.into(), None).await
    }

    /// Mark a job `DONE` with the path of the file it produced
    pub async fn complete(
        &self,
        job_id: &str,
        output_path: PathBuf,
        message: impl Into<String>,
    ) -> Result<Job> {
        self.apply(job_id, JobStatus::Done, message.into(), Some(output_path))
            .await
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn apply(
        &self,
        job_id: &str,
        status: JobStatus,
        message: String,
        output_path: Option<PathBuf>,
    ) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| LedgerError::JobNotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            return Err(LedgerError::TerminalState {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        if !job.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to: status,
            });
        }

        if job.status != status {
            debug!(job_id, from = %job.status, to = %status, "Job transition");
        }
        job.status = status;
        job.message = message;
        if output_path.is_some() {
            job.output_path = output_path;
        }
        job.updated_at = Utc::now();

        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn new_job(url: &str) -> NewJob {
        NewJob {
            source_url: url.to_string(),
            format_selector: "best".to_string(),
            filename_template: "clip.%(ext)s".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_queued() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("https://example.com/v")).await;

        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.output_path.is_none());

        let stored = registry.get(&job.id).await.unwrap();
        assert_eq!(stored.source_url, "https://example.com/v");
        assert_eq!(stored.filename_template, "clip.%(ext)s");
    }

    #[tokio::test]
    async fn test_create_never_repeats_ids() {
        let registry = JobRegistry::new();
        let mut seen = HashSet::new();

        for i in 0..10_000 {
            let job = registry.create(new_job(&format!("https://example.com/{i}"))).await;
            assert!(seen.insert(job.id), "duplicate id at iteration {i}");
        }
        assert_eq!(registry.len().await, 10_000);
    }

    #[tokio::test]
    async fn test_get_unknown_job() {
        let registry = JobRegistry::new();
        assert!(registry.get("missing").await.is_none());
        assert!(matches!(
            registry.transition("missing", JobStatus::Running, "x").await,
            Err(LedgerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_to_done() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("https://example.com/v")).await;

        registry
            .transition(&job.id, JobStatus::Running, "Starting")
            .await
            .unwrap();
        let running = registry
            .transition(&job.id, JobStatus::Running, "Downloading 40%")
            .await
            .unwrap();
        assert_eq!(running.message, "Downloading 40%");

        let done = registry
            .complete(&job.id, PathBuf::from("/tmp/clip.mp4"), "OK")
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.output_path, Some(PathBuf::from("/tmp/clip.mp4")));
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("https://example.com/v")).await;
        registry
            .transition(&job.id, JobStatus::Error, "boom")
            .await
            .unwrap();

        for next in [JobStatus::Queued, JobStatus::Running, JobStatus::Done, JobStatus::Error] {
            let result = registry.transition(&job.id, next, "again").await;
            assert!(matches!(result, Err(LedgerError::TerminalState { .. })));
        }

        let stored = registry.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.message, "boom");
    }

    #[tokio::test]
    async fn test_backward_transition_rejected() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("https://example.com/v")).await;
        registry
            .transition(&job.id, JobStatus::Running, "Starting")
            .await
            .unwrap();

        let result = registry.transition(&job.id, JobStatus::Queued, "back").await;
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_updates() {
        let registry = Arc::new(JobRegistry::new());
        let job = registry.create(new_job("https://example.com/v")).await;

        let writer = {
            let registry = registry.clone();
            let id = job.id.clone();
            tokio::spawn(async move {
                for pct in 0..50 {
                    registry
                        .transition(&id, JobStatus::Running, format!("{pct}%"))
                        .await
                        .unwrap();
                }
                registry
                    .complete(&id, PathBuf::from("out.mp4"), "OK")
                    .await
                    .unwrap();
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let id = job.id.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let job = registry.get(&id).await.unwrap();
                        assert!(!job.message.is_empty());
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(registry.get(&job.id).await.unwrap().status, JobStatus::Done);
    }

    #[test]
    fn test_status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&JobStatus::Running).unwrap(), "\"RUNNING\"");
        assert_eq!(JobStatus::Done.to_string(), "DONE");
    }
}
