use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::service::DownloadService;
use crate::worker::ProcessRunner;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<DownloadService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Starts the download service (and its worker pool) on top of `runner`
    pub fn new(config: Config, runner: Arc<dyn ProcessRunner>, metrics: Arc<Metrics>) -> Self {
        let service = DownloadService::start(&config, runner, metrics.clone());
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            metrics,
        }
    }
}
