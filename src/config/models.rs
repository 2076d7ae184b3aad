use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound for JSON request bodies
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}

/// External downloader invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    #[serde(default = "default_executable")]
    pub executable: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,
    #[serde(default = "default_describe_timeout_secs")]
    pub describe_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    /// Appended to every fetch invocation before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl DownloaderConfig {
    pub fn describe_timeout(&self) -> Duration {
        Duration::from_secs(self.describe_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            download_dir: default_download_dir(),
            merge_output_format: default_merge_output_format(),
            describe_timeout_secs: default_describe_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
            extra_args: Vec::new(),
        }
    }
}

fn default_executable() -> String {
    "yt-dlp".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_describe_timeout_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    3600 // 1 hour
}

fn default_health_timeout_secs() -> u64 {
    5
}

/// Job execution pool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

/// Metadata cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> usize {
    100
}

/// Progress store and status feed timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl ProgressConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_grace_period_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    700
}
