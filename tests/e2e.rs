//! End-to-end tests against the real process runner
//!
//! Shell scripts stand in for the downloader, so these exercise spawning,
//! line streaming, timeouts and artifact resolution on a real filesystem.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::AsyncReadExt;

use mediafetch::config::Config;
use mediafetch::ledger::{Job, JobStatus};
use mediafetch::observability::Metrics;
use mediafetch::service::{DownloadService, ServiceError, Submission};
use mediafetch::worker::SystemRunner;

const FAKE_DOWNLOADER: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "2024.08.06"; exit 0 ;;
  --dump-json)
    echo "[debug] noise on stderr" >&2
    echo '{"id":"dQw4w9WgXcQ","title":"Fake","duration":65,"view_count":1200,"upload_date":"20200102","formats":[{"format_id":"140","ext":"m4a","vcodec":"none","acodec":"mp4a.40.2","abr":128}]}'
    exit 0 ;;
esac
template=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) template="$2"; shift 2 ;;
    *) shift ;;
  esac
done
name=$(printf '%s' "$template" | sed 's/%(ext)s/mp4/')
echo "[download] Destination: $name"
echo "[download]  25.0% of 4.00KiB at 1.00KiB/s ETA 00:03"
echo "[download]  75.0% of 4.00KiB at 1.00KiB/s ETA 00:01"
printf 'real bytes' > "$name"
echo "[download] 100% of 4.00KiB in 00:01"
"#;

const FAILING_DOWNLOADER: &str = r#"#!/bin/sh
echo "[youtube] Extracting URL"
echo "ERROR: [youtube] abc: Private video" >&2
exit 1
"#;

const HANGING_DOWNLOADER: &str = r#"#!/bin/sh
echo $$ > "$PIDFILE"
exec sleep 30
"#;

struct Harness {
    dir: TempDir,
    service: DownloadService,
}

impl Harness {
    fn new(script: &str, configure: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let executable = write_script(dir.path(), script);

        let mut config = Config::default();
        config.downloader.executable = executable.display().to_string();
        config.downloader.download_dir = dir.path().join("downloads");
        config.progress.poll_interval_ms = 20;
        configure(&mut config);

        let metrics = Arc::new(Metrics::new());
        let runner = Arc::new(SystemRunner::new(metrics.clone()));
        let service = DownloadService::start(&config, runner, metrics);
        Self { dir, service }
    }

    async fn submit(&self, hint: Option<&str>) -> Job {
        self.service
            .submit(Submission {
                source_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                format_selector: None,
                output_name_hint: hint.map(str::to_string),
            })
            .await
            .unwrap()
    }

    async fn wait_terminal(&self, job_id: &str) -> Job {
        for _ in 0..500 {
            let job = self.service.job(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} never finished");
    }
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-downloader");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_download_workflow() {
    let harness = Harness::new(FAKE_DOWNLOADER, |_| {});

    let job = harness.submit(Some("song")).await;
    let done = harness.wait_terminal(&job.id).await;

    assert_eq!(done.status, JobStatus::Done, "{}", done.message);
    assert_eq!(done.message, "Download completed");
    assert_eq!(
        done.output_path.as_deref(),
        Some(harness.dir.path().join("downloads/song.mp4").as_path())
    );

    let mut artifact = harness.service.artifact(&job.id).await.unwrap();
    assert_eq!(artifact.file_name, "song.mp4");
    assert_eq!(artifact.size, 10);
    let mut content = Vec::new();
    artifact.file.read_to_end(&mut content).await.unwrap();
    assert_eq!(content, b"real bytes");

    let snapshot = harness.service.progress(&job.id).await.unwrap();
    assert_eq!(snapshot.percentage, 100);
}

#[tokio::test]
async fn test_metadata_from_describe_mode() {
    let harness = Harness::new(FAKE_DOWNLOADER, |_| {});

    let metadata = harness
        .service
        .metadata("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();

    assert_eq!(metadata.id, "dQw4w9WgXcQ");
    assert_eq!(metadata.duration, "1:05");
    assert_eq!(metadata.views, "1.2K views");
    assert_eq!(metadata.upload_date, "2020-01-02");
    assert_eq!(metadata.formats.len(), 1);
    assert_eq!(metadata.formats[0].quality, "Audio Only");
    assert_eq!(metadata.formats[0].bitrate, "128 kbps");
}

#[tokio::test]
async fn test_failing_tool_reports_error_line() {
    let harness = Harness::new(FAILING_DOWNLOADER, |_| {});

    let job = harness.submit(None).await;
    let failed = harness.wait_terminal(&job.id).await;

    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(
        failed.message,
        "Download failed: ERROR: [youtube] abc: Private video"
    );
    assert!(matches!(
        harness.service.artifact(&job.id).await,
        Err(ServiceError::Conflict { .. })
    ));
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let pid_dir = TempDir::new().unwrap();
    let pid_file = pid_dir.path().join("pid");
    // SAFETY: only this test reads PIDFILE, and it is set before any process spawns
    unsafe { std::env::set_var("PIDFILE", &pid_file) };

    let harness = Harness::new(HANGING_DOWNLOADER, |config| {
        config.downloader.fetch_timeout_secs = 1;
    });

    let job = harness.submit(None).await;
    let failed = harness.wait_terminal(&job.id).await;

    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(failed.message, "Download timed out after 1s");

    #[cfg(target_os = "linux")]
    {
        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(!Path::new(&format!("/proc/{}", pid.trim())).exists());
    }
}

#[tokio::test]
async fn test_missing_executable() {
    let harness = Harness::new(FAKE_DOWNLOADER, |config| {
        config.downloader.executable = "/nonexistent/downloader".to_string();
    });

    let health = harness.service.health().await;
    assert!(!health.downloader);
    assert!(health.job_broker);

    let job = harness.submit(None).await;
    let failed = harness.wait_terminal(&job.id).await;
    assert_eq!(failed.status, JobStatus::Error);
}
