//! Interpretation of the downloader's `--dump-json` document

use serde_json::Value;
use tracing::debug;

use super::MetadataError;
use super::types::{FormatOption, VideoMetadata};
use crate::humanize::{format_duration, format_file_size, format_upload_date, format_views};

const NO_CODEC: &str = "none";

/// Build [`VideoMetadata`] from describe-mode output.
///
/// The first line that starts a JSON object is parsed. A document without an
/// `id` and `title` is rejected rather than returned half-filled.
pub fn parse_metadata(output: &str) -> Result<VideoMetadata, MetadataError> {
    let document = output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| MetadataError::ParseFailure("no JSON document in output".to_string()))?;

    let root: Value = serde_json::from_str(document)
        .map_err(|e| MetadataError::ParseFailure(format!("invalid JSON: {e}")))?;

    let id = required_str(&root, "id")?;
    let title = required_str(&root, "title")?;

    Ok(VideoMetadata {
        id,
        title,
        description: root
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        thumbnail: root
            .get("thumbnail")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration: format_duration(number(&root, "duration").map(|secs| secs.round() as u64)),
        views: format_views(root.get("view_count").and_then(Value::as_u64)),
        upload_date: format_upload_date(root.get("upload_date").and_then(Value::as_str)),
        formats: parse_formats(&root),
    })
}

fn required_str(root: &Value, field: &str) -> Result<String, MetadataError> {
    root.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MetadataError::ParseFailure(format!("missing field '{field}'")))
}

fn number(value: &Value, field: &str) -> Option<f64> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
}

fn codec(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty() && *c != NO_CODEC)
        .map(str::to_string)
}

fn parse_formats(root: &Value) -> Vec<FormatOption> {
    let Some(formats) = root.get("formats").and_then(Value::as_array) else {
        return Vec::new();
    };

    formats.iter().filter_map(parse_format).collect()
}

/// `None` for entries that are neither a playable video nor an audio stream
fn parse_format(format: &Value) -> Option<FormatOption> {
    let format_id = format.get("format_id").and_then(Value::as_str)?.to_string();
    let video_codec = codec(format, "vcodec");
    let audio_codec = codec(format, "acodec");

    if video_codec.is_none() && audio_codec.is_none() {
        debug!(format_id, "Skipping format without audio or video stream");
        return None;
    }

    let container = format
        .get("ext")
        .and_then(Value::as_str)
        .map(str::to_uppercase)
        .unwrap_or_else(|| "Unknown".to_string());
    let size = format_file_size(
        number(format, "filesize")
            .or_else(|| number(format, "filesize_approx"))
            .map(|bytes| bytes as u64),
    );

    let option = match video_codec {
        Some(video) => FormatOption {
            format_id,
            quality: match format.get("height").and_then(Value::as_u64) {
                Some(height) if height > 0 => format!("{height}p"),
                _ => "Unknown".to_string(),
            },
            container,
            size,
            fps: number(format, "fps").map(|fps| fps.round() as u32).unwrap_or(0),
            codec: Some(video),
            audio_codec,
            bitrate: kbps(number(format, "tbr")).unwrap_or_else(|| "Unknown".to_string()),
        },
        None => FormatOption {
            format_id,
            quality: "Audio Only".to_string(),
            container,
            size,
            fps: 0,
            codec: None,
            audio_codec,
            bitrate: kbps(number(format, "abr"))
                .or_else(|| {
                    number(format, "asr")
                        .filter(|hz| *hz >= 1000.0)
                        .map(|hz| format!("{} kHz", (hz / 1000.0) as u64))
                })
                .unwrap_or_else(|| "Unknown".to_string()),
        },
    };
    Some(option)
}

fn kbps(rate: Option<f64>) -> Option<String> {
    rate.filter(|r| *r > 0.0)
        .map(|r| format!("{} kbps", r.round() as u64))
}
