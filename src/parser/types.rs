use serde::{Deserialize, Serialize};

/// Coarse phase of a fetch job as inferred from the downloader's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Starting,
    Downloading,
    Merging,
    ExtractingAudio,
    WritingMetadata,
    Finalizing,
    Completed,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Starting => "Starting",
            Stage::Downloading => "Downloading",
            Stage::Merging => "Merging",
            Stage::ExtractingAudio => "Extracting audio",
            Stage::WritingMetadata => "Writing metadata",
            Stage::Finalizing => "Finalizing",
            Stage::Completed => "Completed",
        }
    }
}

/// A percentage reading, optionally with the speed and ETA tokens of the
/// canonical `NN.N% of SIZE at SPEED ETA MM:SS` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub stage: Stage,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl ProgressUpdate {
    pub fn new(percent: u8, stage: Stage) -> Self {
        Self {
            percent,
            stage,
            speed: None,
            eta: None,
        }
    }
}

/// Structured reading extracted from a single output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress(ProgressUpdate),
    /// The line reports a failure rather than progress
    Failed { line: String },
}

impl ProgressEvent {
    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::Progress(update) => Some(update.percent),
            ProgressEvent::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProgressEvent::Failed { .. })
    }
}
