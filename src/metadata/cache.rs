use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::parse::parse_metadata;
use super::types::VideoMetadata;
use super::url::{extract_video_id, is_supported_url};
use super::{MetadataError, Result};
use crate::config::DownloaderConfig;
use crate::observability::Metrics;
use crate::worker::process::{ProcessRunner, ProcessSpec};

/// Describe-mode argument list
pub fn describe_args(url: &str) -> Vec<String> {
    ["--dump-json", "--no-warnings", "--no-playlist", url]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Source URL → [`VideoMetadata`], cleared wholesale once it reaches `max_entries`
///
/// Only successful lookups are stored.
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<VideoMetadata>>>,
    max_entries: usize,
    runner: Arc<dyn ProcessRunner>,
    program: String,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl MetadataCache {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        downloader: &DownloaderConfig,
        max_entries: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            runner,
            program: downloader.executable.clone(),
            timeout: downloader.describe_timeout(),
            metrics,
        }
    }

    pub async fn get(&self, url: &str) -> Result<Arc<VideoMetadata>> {
        let url = url.trim();
        if !is_supported_url(url) {
            return Err(MetadataError::InvalidInput(format!("unsupported URL: {url}")));
        }
        if extract_video_id(url).is_none() {
            return Err(MetadataError::InvalidInput(format!(
                "could not extract a video id from {url}"
            )));
        }

        if let Some(hit) = self.entries.read().await.get(url) {
            self.metrics.cache_hit();
            debug!(url, "Metadata cache hit");
            return Ok(hit.clone());
        }
        self.metrics.cache_miss();
        debug!(url, "Metadata cache miss");

        let metadata = Arc::new(self.describe(url).await?);

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(url) {
            info!(evicted = entries.len(), "Metadata cache full, clearing");
            entries.clear();
            self.metrics.cache_cleared();
        }
        entries.insert(url.to_string(), metadata.clone());

        Ok(metadata)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.entries.read().await.contains_key(url.trim())
    }

    async fn describe(&self, url: &str) -> Result<VideoMetadata> {
        let spec = ProcessSpec::builder()
            .program(&self.program)
            .args(describe_args(url))
            .timeout(self.timeout)
            .merge_stderr(false)
            .build();

        let output = self.runner.run_buffered(spec).await?;
        let metadata = parse_metadata(&output)?;
        info!(url, video_id = %metadata.id, formats = metadata.formats.len(), "Fetched metadata");
        Ok(metadata)
    }
}
