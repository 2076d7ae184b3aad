use serde::{Deserialize, Serialize};

/// Descriptive metadata for one video, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    /// `H:MM:SS` or `M:SS`
    pub duration: String,
    /// `1.2M views`
    pub views: String,
    /// `YYYY-MM-DD`
    pub upload_date: String,
    pub formats: Vec<FormatOption>,
}

/// One selectable quality/container combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOption {
    pub format_id: String,
    /// `720p`, `Unknown`, or `Audio Only`
    pub quality: String,
    pub container: String,
    pub size: String,
    /// 0 for audio-only formats
    pub fps: u32,
    /// Video codec; `None` for audio-only formats
    pub codec: Option<String>,
    pub audio_codec: Option<String>,
    pub bitrate: String,
}

impl FormatOption {
    pub fn is_audio_only(&self) -> bool {
        self.codec.is_none()
    }
}
