//! Download service facade
//!
//! [`DownloadService`] owns every shared component (job registry, progress
//! store, metadata cache, job broker, status notifier) and exposes the
//! operations the HTTP layer and the CLI call. All failures surface as
//! [`ServiceError`] kinds; background job failures are recorded on the job
//! itself and never turn a status query into an error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::fs::File;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use crate::config::{Config, DownloaderConfig};
use crate::ledger::{Job, JobRegistry, JobStatus, NewJob, ProgressSnapshot, ProgressStore};
use crate::messaging::StatusNotifier;
use crate::metadata::url::is_fetchable_url;
use crate::metadata::{MetadataCache, MetadataError, VideoMetadata};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::queue::JobBroker;
use crate::storage::{artifact_file_name, open_artifact};
use crate::worker::process::{ProcessError, check_available};
use crate::worker::{JobRunner, ProcessRunner, spawn_pool};

const DEFAULT_FORMAT: &str = "best";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is still {status}")]
    NotReady { job_id: String, status: JobStatus },

    #[error("Job {job_id} failed: {message}")]
    Conflict { job_id: String, message: String },

    #[error("Process timed out after {0:?}")]
    ProcessTimeout(Duration),

    #[error("Process failed: {0}")]
    ProcessFailed(String),

    #[error("Output file missing: {0}")]
    ArtifactNotFound(String),

    #[error("Could not interpret metadata: {0}")]
    ParseFailure(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected failure: {0}")]
    Unknown(String),
}

impl From<MetadataError> for ServiceError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            MetadataError::ParseFailure(msg) => ServiceError::ParseFailure(msg),
            MetadataError::Process(err) => match err {
                ProcessError::TimedOut { after, .. } => ServiceError::ProcessTimeout(after),
                ProcessError::Failed { .. } => ServiceError::ProcessFailed(err.diagnostic()),
                other => ServiceError::Unknown(other.to_string()),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// A download request as received from a client
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub source_url: String,
    pub format_selector: Option<String>,
    pub output_name_hint: Option<String>,
}

/// A finished job's file, opened for streaming
#[derive(Debug)]
pub struct Artifact {
    pub file_name: String,
    pub size: u64,
    pub file: File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub downloader: bool,
    pub job_broker: bool,
    /// Jobs accepted but not yet picked up by a worker
    pub pending_jobs: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.downloader && self.job_broker
    }
}

/// File stem for a job: the client's hint made safe, or `video_<unix-millis>`
pub fn output_stem(hint: Option<&str>) -> String {
    let cleaned: String = hint
        .unwrap_or_default()
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '%' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim();

    if cleaned.is_empty() {
        format!("video_{}", Utc::now().timestamp_millis())
    } else {
        cleaned.to_string()
    }
}

pub struct DownloadService {
    registry: Arc<JobRegistry>,
    progress: Arc<ProgressStore>,
    metadata: MetadataCache,
    broker: JobBroker,
    notifier: StatusNotifier,
    runner: Arc<dyn ProcessRunner>,
    downloader: DownloaderConfig,
    metrics: Arc<Metrics>,
}

impl DownloadService {
    /// Wire the components together and start the worker pool.
    ///
    /// Must be called from within a Tokio runtime. The pool stops when the
    /// service is dropped.
    pub fn start(config: &Config, runner: Arc<dyn ProcessRunner>, metrics: Arc<Metrics>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let progress = Arc::new(ProgressStore::new(config.progress.grace_period()));
        let metadata = MetadataCache::new(
            runner.clone(),
            &config.downloader,
            config.cache.max_entries,
            metrics.clone(),
        );
        let notifier = StatusNotifier::new(registry.clone(), config.progress.poll_interval());

        let (broker, receiver) = JobBroker::new(config.workers.queue_capacity);
        let job_runner = Arc::new(JobRunner::new(
            registry.clone(),
            progress.clone(),
            runner.clone(),
            config.downloader.clone(),
            metrics.clone(),
        ));
        spawn_pool(receiver, config.workers.max_concurrent_jobs, job_runner);

        info!(
            executable = %config.downloader.executable,
            download_dir = %config.downloader.download_dir.display(),
            "Download service started"
        );

        Self {
            registry,
            progress,
            metadata,
            broker,
            notifier,
            runner,
            downloader: config.downloader.clone(),
            metrics,
        }
    }

    /// Register a job and queue it for download. Returns as soon as the job
    /// is queued; the download itself runs on the worker pool.
    pub async fn submit(&self, submission: Submission) -> Result<Job> {
        let source_url = submission.source_url.trim();
        if source_url.is_empty() {
            return Err(ServiceError::InvalidInput("sourceUrl is required".to_string()));
        }
        if !is_fetchable_url(source_url) {
            return Err(ServiceError::InvalidInput(format!(
                "sourceUrl must be an http(s) URL: {source_url}"
            )));
        }

        let format_selector = submission
            .format_selector
            .as_deref()
            .map(str::trim)
            .filter(|selector| !selector.is_empty())
            .unwrap_or(DEFAULT_FORMAT)
            .to_string();
        let stem = output_stem(submission.output_name_hint.as_deref());

        let job = self
            .registry
            .create(NewJob {
                source_url: source_url.to_string(),
                format_selector,
                filename_template: format!("{stem}.%(ext)s"),
            })
            .await;
        self.metrics.job_submitted();
        info!(job_id = %job.id, url = %job.source_url, "Job submitted");

        if let Err(err) = self.broker.enqueue(job.clone()) {
            warn!(job_id = %job.id, error = %err, "Job rejected by queue");
            if let Err(mark_err) = self
                .registry
                .transition(&job.id, JobStatus::Error, err.to_string())
                .await
            {
                warn!(job_id = %job.id, error = %mark_err, "Could not mark rejected job");
            }
            self.metrics.job_failed();
            return Err(ServiceError::Unavailable(err.to_string()));
        }

        Ok(job)
    }

    pub async fn job(&self, job_id: &str) -> Result<Job> {
        self.registry
            .get(job_id)
            .await
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))
    }

    pub async fn progress(&self, job_id: &str) -> Result<ProgressSnapshot> {
        self.progress
            .get(job_id)
            .await
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))
    }

    /// Open handle on a finished job's file
    pub async fn artifact(&self, job_id: &str) -> Result<Artifact> {
        let job = self.job(job_id).await?;

        match job.status {
            JobStatus::Queued | JobStatus::Running => Err(ServiceError::NotReady {
                job_id: job.id,
                status: job.status,
            }),
            JobStatus::Error => Err(ServiceError::Conflict {
                job_id: job.id,
                message: job.message,
            }),
            JobStatus::Done => {
                let path = job
                    .output_path
                    .ok_or_else(|| ServiceError::ArtifactNotFound(job.id.clone()))?;
                let (file, size) = open_artifact(&path)
                    .await
                    .map_err(|err| ServiceError::ArtifactNotFound(err.to_string()))?;
                Ok(Artifact {
                    file_name: artifact_file_name(&path),
                    size,
                    file,
                })
            }
        }
    }

    pub async fn metadata(&self, url: &str) -> Result<Arc<VideoMetadata>> {
        Ok(self.metadata.get(url).await?)
    }

    pub async fn health(&self) -> HealthReport {
        let downloader = check_available(
            self.runner.as_ref(),
            &self.downloader.executable,
            self.downloader.health_timeout(),
        )
        .await;

        HealthReport {
            downloader,
            job_broker: self.broker.health_check(),
            pending_jobs: self.broker.pending(),
        }
    }

    /// Live `status=..|message=..` feed for a job
    pub async fn status_stream(&self, job_id: &str) -> WatchStream<String> {
        self.notifier.subscribe(job_id).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
