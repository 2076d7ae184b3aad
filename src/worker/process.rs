//! External process supervision

use async_trait::async_trait;
use bon::Builder;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::observability::Metrics;

const LINE_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process timed out after {after:?}")]
    TimedOut { after: Duration, output: String },

    #[error("process exited with {}", exit_label(.code))]
    Failed { code: Option<i32>, output: String },

    #[error("process I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Output captured before the failure, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            ProcessError::TimedOut { output, .. } | ProcessError::Failed { output, .. } => {
                Some(output.as_str())
            }
            _ => None,
        }
    }

    /// The tool's last `ERROR` line when it printed one, otherwise the error itself
    pub fn diagnostic(&self) -> String {
        self.output()
            .and_then(|output| {
                output
                    .lines()
                    .rev()
                    .map(str::trim)
                    .find(|line| line.starts_with("ERROR"))
            })
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// One external command invocation
#[derive(Debug, Clone, Builder)]
pub struct ProcessSpec {
    #[builder(into)]
    pub program: String,
    #[builder(default)]
    pub args: Vec<String>,
    #[builder(into)]
    pub working_dir: Option<PathBuf>,
    /// Wall-clock budget; the process is killed when it runs out
    pub timeout: Option<Duration>,
    /// Deliver stderr lines interleaved with stdout. When false, stderr is only
    /// kept for failure diagnostics.
    #[builder(default = true)]
    pub merge_stderr: bool,
}

/// Launches external commands and reports how they ended
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion and return the captured output
    async fn run_buffered(&self, spec: ProcessSpec) -> Result<String>;

    /// Run to completion, sending each output line to `lines` as it is
    /// produced. The captured output is also returned. `lines` is dropped
    /// before this returns, so a receiver loop ends on its own.
    async fn run_streaming(&self, spec: ProcessSpec, lines: mpsc::Sender<String>) -> Result<String>;
}

/// True when `program --version` exits successfully within `timeout`
pub async fn check_available(runner: &dyn ProcessRunner, program: &str, timeout: Duration) -> bool {
    let spec = ProcessSpec::builder()
        .program(program)
        .args(vec!["--version".to_string()])
        .timeout(timeout)
        .merge_stderr(false)
        .build();

    match runner.run_buffered(spec).await {
        Ok(version) => {
            debug!(program, version = version.trim(), "Downloader available");
            true
        }
        Err(err) => {
            warn!(program, error = %err, "Downloader unavailable");
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// [`ProcessRunner`] backed by real OS processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    metrics: Arc<Metrics>,
}

impl SystemRunner {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    async fn execute(
        &self,
        spec: ProcessSpec,
        sink: Option<mpsc::Sender<String>>,
    ) -> Result<String> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group so a timeout also reaches anything the tool spawned
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();
        self.metrics.process_spawned();
        debug!(program = %spec.program, pid, args = ?spec.args, "Spawned process");

        let (tx, mut rx) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, StreamKind::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, StreamKind::Stderr, tx.clone()));
        }
        drop(tx);

        let mut captured = String::new();
        let mut diagnostics = String::new();

        let drive = async {
            while let Some((kind, line)) = rx.recv().await {
                if kind == StreamKind::Stderr && !spec.merge_stderr {
                    push_line(&mut diagnostics, &line);
                    continue;
                }
                push_line(&mut captured, &line);
                if let Some(sink) = &sink {
                    // A consumer that went away only loses the live feed
                    let _ = sink.send(line).await;
                }
            }
            child.wait().await
        };

        let waited: Option<std::io::Result<ExitStatus>> = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, drive).await.ok(),
            None => Some(drive.await),
        };

        let Some(status) = waited else {
            let after = spec.timeout.unwrap_or_default();
            warn!(
                program = %spec.program,
                pid,
                timeout_ms = after.as_millis() as u64,
                "Process exceeded its time budget, killing"
            );
            terminate(&mut child).await;
            return Err(ProcessError::TimedOut {
                after,
                output: join_output(captured, diagnostics),
            });
        };
        let status = status?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.success() {
            info!(program = %spec.program, pid, elapsed_ms, "Process finished");
            Ok(captured)
        } else {
            warn!(program = %spec.program, pid, exit_code = ?status.code(), elapsed_ms, "Process failed");
            Err(ProcessError::Failed {
                code: status.code(),
                output: join_output(captured, diagnostics),
            })
        }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run_buffered(&self, spec: ProcessSpec) -> Result<String> {
        self.execute(spec, None).await
    }

    async fn run_streaming(&self, spec: ProcessSpec, lines: mpsc::Sender<String>) -> Result<String> {
        self.execute(spec, Some(lines)).await
    }
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            kill_group(pid);
        }
    }
    if let Err(err) = child.start_kill() {
        warn!(error = %err, "Failed to signal process");
    }
    match child.wait().await {
        Ok(status) => debug!(?status, "Killed process reaped"),
        Err(err) => warn!(error = %err, "Failed to reap killed process"),
    }
}

/// SIGKILL the process group led by `pid`
#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "Process group already gone");
    }
}

/// Read `reader` line by line (lossy UTF-8, `\r\n` tolerated) into `tx`
async fn forward_lines<R>(reader: R, kind: StreamKind, tx: mpsc::Sender<(StreamKind, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                let line = line.trim_end_matches('\r').to_string();
                if tx.send((kind, line)).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(?kind, error = %err, "Stopped reading process output");
                break;
            }
        }
    }
}

fn push_line(buffer: &mut String, line: &str) {
    buffer.push_str(line);
    buffer.push('\n');
}

fn join_output(mut captured: String, diagnostics: String) -> String {
    captured.push_str(&diagnostics);
    captured
}
