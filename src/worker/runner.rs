//! Job runner - drives one fetch job from RUNNING to a terminal state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::process::{ProcessError, ProcessRunner, ProcessSpec};
use crate::config::DownloaderConfig;
use crate::ledger::{Job, JobRegistry, JobStatus, ProgressSnapshot, ProgressStore};
use crate::observability::Metrics;
use crate::parser::{ProgressEvent, parse_line};
use crate::storage::{ArtifactError, resolve_artifact};

const LINE_BUFFER: usize = 128;
const TEMPLATE_SUFFIX: &str = ".%(ext)s";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Download timed out after {0:?}")]
    Timeout(Duration),

    #[error("Download failed: {0}")]
    ProcessFailed(String),

    #[error("Download finished but no output file was found")]
    ArtifactNotFound,

    #[error("Unexpected failure: {0}")]
    Unknown(String),
}

impl From<ProcessError> for JobError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::TimedOut { after, .. } => JobError::Timeout(after),
            ProcessError::Failed { .. } => JobError::ProcessFailed(err.diagnostic()),
            other => JobError::Unknown(other.to_string()),
        }
    }
}

impl From<ArtifactError> for JobError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound { .. } => JobError::ArtifactNotFound,
            ArtifactError::Io(e) => JobError::Unknown(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Fetch-mode argument list for `job`
pub fn fetch_args(job: &Job, downloader: &DownloaderConfig) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        job.format_selector.clone(),
        "-o".to_string(),
        job.filename_template.clone(),
        "--no-playlist".to_string(),
        "--merge-output-format".to_string(),
        downloader.merge_output_format.clone(),
        "--no-mtime".to_string(),
        "--newline".to_string(),
    ];
    args.extend(downloader.extra_args.iter().cloned());
    args.push(job.source_url.clone());
    args
}

/// The `<name>` part of a `<name>.%(ext)s` template
pub fn template_stem(template: &str) -> Option<&str> {
    template.strip_suffix(TEMPLATE_SUFFIX).filter(|stem| !stem.is_empty())
}

/// Executes jobs handed over by the worker pool
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    progress: Arc<ProgressStore>,
    runner: Arc<dyn ProcessRunner>,
    downloader: DownloaderConfig,
    metrics: Arc<Metrics>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        progress: Arc<ProgressStore>,
        runner: Arc<dyn ProcessRunner>,
        downloader: DownloaderConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            progress,
            runner,
            downloader,
            metrics,
        }
    }

    /// Run `job` to completion and record the outcome in the registry and
    /// progress store. Never returns an error: failures end up in the job.
    pub async fn run(&self, job: Job) {
        let job_id = job.id.clone();
        info!(job_id = %job_id, url = %job.source_url, "Job started");

        match self.execute(&job).await {
            Ok(path) => {
                self.progress.update(ProgressSnapshot::completed(&job_id)).await;
                match self
                    .registry
                    .complete(&job_id, path.clone(), "Download completed")
                    .await
                {
                    Ok(_) => {
                        self.metrics.job_completed();
                        info!(job_id = %job_id, path = %path.display(), "Job finished");
                    }
                    Err(err) => warn!(job_id = %job_id, error = %err, "Could not mark job done"),
                }
            }
            Err(err) => {
                let message = err.to_string();
                let percentage = self.progress.percentage(&job_id).await.unwrap_or(0);
                self.progress
                    .update(ProgressSnapshot::failed(&job_id, percentage, &message))
                    .await;
                if let Err(ledger_err) = self
                    .registry
                    .transition(&job_id, JobStatus::Error, message.clone())
                    .await
                {
                    warn!(job_id = %job_id, error = %ledger_err, "Could not mark job failed");
                }
                self.metrics.job_failed();
                warn!(job_id = %job_id, error = %message, "Job failed");
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<PathBuf> {
        let dir = self.downloader.download_dir.clone();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            JobError::Unknown(format!("cannot create {}: {e}", dir.display()))
        })?;

        self.registry
            .transition(&job.id, JobStatus::Running, "Starting")
            .await
            .map_err(|e| JobError::Unknown(e.to_string()))?;
        self.progress.update(ProgressSnapshot::starting(&job.id)).await;

        let spec = ProcessSpec::builder()
            .program(&self.downloader.executable)
            .args(fetch_args(job, &self.downloader))
            .working_dir(dir.clone())
            .timeout(self.downloader.fetch_timeout())
            .merge_stderr(true)
            .build();

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let (outcome, ()) = tokio::join!(
            self.runner.run_streaming(spec, tx),
            self.track(&job.id, rx)
        );
        let output = outcome?;

        let path = resolve_artifact(&output, &dir, template_stem(&job.filename_template)).await?;
        Ok(path)
    }

    /// Feed output lines through the parser into the progress store and
    /// mirror them into the job's message
    async fn track(&self, job_id: &str, mut lines: mpsc::Receiver<String>) {
        while let Some(line) = lines.recv().await {
            debug!(job_id, line = %line, "Downloader output");

            match parse_line(&line) {
                Some(ProgressEvent::Progress(update)) => {
                    let message = format!("{} {}%", update.stage.label(), update.percent);
                    self.progress
                        .update(ProgressSnapshot::from_update(job_id, &update))
                        .await;
                    self.mirror(job_id, message).await;
                }
                Some(ProgressEvent::Failed { line }) => {
                    let percentage = self.progress.percentage(job_id).await.unwrap_or(0);
                    self.progress
                        .update(ProgressSnapshot::failed(job_id, percentage, &line))
                        .await;
                    self.mirror(job_id, line).await;
                }
                None => {}
            }
        }
    }

    async fn mirror(&self, job_id: &str, message: String) {
        if let Err(err) = self
            .registry
            .transition(job_id, JobStatus::Running, message)
            .await
        {
            debug!(job_id, error = %err, "Progress not mirrored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewJob;
    use crate::worker::process;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Streams canned lines, optionally writing the announced file first
    struct Scripted {
        lines: Vec<String>,
        write: Option<(String, &'static [u8])>,
        result: fn(String) -> process::Result<String>,
    }

    #[async_trait]
    impl ProcessRunner for Scripted {
        async fn run_buffered(&self, _spec: ProcessSpec) -> process::Result<String> {
            unreachable!("fetch jobs stream their output")
        }

        async fn run_streaming(
            &self,
            spec: ProcessSpec,
            lines: mpsc::Sender<String>,
        ) -> process::Result<String> {
            if let (Some((name, bytes)), Some(dir)) = (&self.write, &spec.working_dir) {
                std::fs::write(dir.join(name), bytes).unwrap();
            }
            let mut captured = String::new();
            for line in &self.lines {
                captured.push_str(line);
                captured.push('\n');
                lines.send(line.clone()).await.unwrap();
            }
            (self.result)(captured)
        }
    }

    struct Fixture {
        _dir: TempDir,
        registry: Arc<JobRegistry>,
        progress: Arc<ProgressStore>,
        runner: JobRunner,
    }

    fn fixture(scripted: Scripted) -> Fixture {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(JobRegistry::new());
        let progress = Arc::new(ProgressStore::default());
        let downloader = DownloaderConfig {
            download_dir: dir.path().join("downloads"),
            ..Default::default()
        };
        let runner = JobRunner::new(
            registry.clone(),
            progress.clone(),
            Arc::new(scripted),
            downloader,
            Arc::new(Metrics::new()),
        );
        Fixture {
            _dir: dir,
            registry,
            progress,
            runner,
        }
    }

    async fn submit(registry: &JobRegistry) -> Job {
        registry
            .create(NewJob {
                source_url: "https://example.com/v".to_string(),
                format_selector: "best".to_string(),
                filename_template: "clip.%(ext)s".to_string(),
            })
            .await
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_successful_job() {
        let f = fixture(Scripted {
            lines: lines(&[
                "[download] Destination: clip.mp4",
                "[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01",
                "[download] 100% of 1.00MiB",
            ]),
            write: Some(("clip.mp4".to_string(), &b"video-bytes"[..])),
            result: Ok,
        });
        let job = submit(&f.registry).await;

        f.runner.run(job.clone()).await;

        let done = f.registry.get(&job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert!(done.output_path.unwrap().ends_with("clip.mp4"));

        let snapshot = f.progress.get(&job.id).await.unwrap();
        assert_eq!(snapshot.percentage, 100);
        assert_eq!(snapshot.status, "Completed");
    }

    #[tokio::test]
    async fn test_success_without_artifact_is_failure() {
        let f = fixture(Scripted {
            lines: lines(&["[download] Destination: clip.mp4"]),
            write: None,
            result: Ok,
        });
        let job = submit(&f.registry).await;

        f.runner.run(job.clone()).await;

        let failed = f.registry.get(&job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.message, JobError::ArtifactNotFound.to_string());
    }

    #[tokio::test]
    async fn test_timeout_message() {
        let f = fixture(Scripted {
            lines: lines(&["[download]  12.0% of 5.00MiB"]),
            write: None,
            result: |output| {
                Err(ProcessError::TimedOut {
                    after: Duration::from_millis(500),
                    output,
                })
            },
        });
        let job = submit(&f.registry).await;

        f.runner.run(job.clone()).await;

        let failed = f.registry.get(&job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.message, "Download timed out after 500ms");

        // failure snapshot keeps the last percentage
        let snapshot = f.progress.get(&job.id).await.unwrap();
        assert_eq!(snapshot.percentage, 12);
        assert!(snapshot.status.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_tool_error() {
        let f = fixture(Scripted {
            lines: lines(&["ERROR: [youtube] abc: Video unavailable"]),
            write: None,
            result: |output| Err(ProcessError::Failed { code: Some(1), output }),
        });
        let job = submit(&f.registry).await;

        f.runner.run(job.clone()).await;

        let failed = f.registry.get(&job.id).await.unwrap();
        assert_eq!(
            failed.message,
            "Download failed: ERROR: [youtube] abc: Video unavailable"
        );
    }

    #[test]
    fn test_fetch_args() {
        let job = Job {
            id: "j".to_string(),
            source_url: "https://example.com/v".to_string(),
            format_selector: "bestvideo+bestaudio".to_string(),
            filename_template: "clip.%(ext)s".to_string(),
            status: JobStatus::Queued,
            message: String::new(),
            output_path: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let downloader = DownloaderConfig {
            extra_args: vec!["--restrict-filenames".to_string()],
            ..Default::default()
        };

        assert_eq!(
            fetch_args(&job, &downloader),
            [
                "-f",
                "bestvideo+bestaudio",
                "-o",
                "clip.%(ext)s",
                "--no-playlist",
                "--merge-output-format",
                "mp4",
                "--no-mtime",
                "--newline",
                "--restrict-filenames",
                "https://example.com/v"
            ]
        );
    }

    #[test]
    fn test_template_stem() {
        assert_eq!(template_stem("clip.%(ext)s"), Some("clip"));
        assert_eq!(template_stem(".%(ext)s"), None);
        assert_eq!(template_stem("%(title)s"), None);
    }
}
