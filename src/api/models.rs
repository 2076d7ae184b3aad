use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ledger::{Job, JobStatus};
use crate::observability::MetricsSnapshot;

/// Body of `POST /api/jobs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub format_selector: Option<String>,
    #[serde(default)]
    pub output_name_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: String,
    pub filename_template: String,
    pub status: JobStatus,
    pub message: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            filename_template: job.filename_template,
            status: job.status,
            message: job.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub pending_jobs: usize,
    pub metrics: MetricsSnapshot,
}
