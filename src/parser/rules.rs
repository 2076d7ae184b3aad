use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ProgressEvent, ProgressUpdate, Stage};
use crate::humanize::scaled_bytes;

/// One pattern → event transformation
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<ProgressEvent>,
}

/// Rules in precedence order. A line is offered to each rule in turn and the
/// first `Some` is the result.
pub static RULES: &[Rule] = &[
    Rule {
        name: "percentage",
        apply: percentage,
    },
    Rule {
        name: "item_count",
        apply: item_count,
    },
    Rule {
        name: "byte_ratio",
        apply: byte_ratio,
    },
    Rule {
        name: "post_processing",
        apply: post_processing,
    },
    Rule {
        name: "completion",
        apply: completion,
    },
    Rule {
        name: "destination",
        apply: destination,
    },
    Rule {
        name: "error",
        apply: error,
    },
];

/// The number may follow any text (`Downloading fragment: 45.0%`) but must
/// start on a non-digit, non-dot boundary so `12.5.1%` is not read as `5.1%`
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[download\](?:.*?[^\d.])?(\d+(?:\.\d+)?)%").expect("percent regex")
});

static RICH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[download\]\s+\d+(?:\.\d+)?%\s+of\s+~?\s*[\d.,]+\s*[KMGT]?i?B\s+at\s+(.+?)\s+ETA\s+(\S+)",
    )
    .expect("rich progress regex")
});

static ITEMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[download\].*?\b(\d+)\s+of\s+(\d+)(?:\s|$)").expect("item count regex")
});

static SIZES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[download\].*?(\d+(?:\.\d+)?)\s*([KMGT]?i?B)\s+of\s+~?\s*(\d+(?:\.\d+)?)\s*([KMGT]?i?B)",
    )
    .expect("byte ratio regex")
});

/// Post-processor tags and the fixed percentage each one stands for.
const STAGE_MARKERS: &[(&str, u8, Stage)] = &[
    ("[Merger]", 90, Stage::Merging),
    ("[ExtractAudio]", 95, Stage::ExtractingAudio),
    ("[Metadata]", 97, Stage::WritingMetadata),
    ("[info]", 99, Stage::Finalizing),
];

const COMPLETION_PHRASES: &[&str] = &[
    "100%",
    "has already been downloaded",
    "already downloaded",
    "Download completed",
];

/// Parse one line of downloader output.
///
/// Blank lines and lines no rule recognises yield `None`.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim_end();
    if line.trim().is_empty() {
        return None;
    }
    RULES.iter().find_map(|rule| (rule.apply)(line))
}

/// Clamp to `[0, 100]` then round half away from zero (`45.5` → `46`).
pub fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

fn ratio_percent(current: f64, total: f64) -> u8 {
    clamp_percent(current * 100.0 / total)
}

fn percentage(line: &str) -> Option<ProgressEvent> {
    let caps = PERCENT_RE.captures(line)?;
    let value: f64 = caps[1].parse().ok()?;

    let mut update = ProgressUpdate::new(clamp_percent(value), Stage::Downloading);
    if let Some(rich) = RICH_RE.captures(line) {
        update.speed = Some(rich[1].trim().to_string());
        update.eta = Some(rich[2].to_string());
    }
    Some(ProgressEvent::Progress(update))
}

fn item_count(line: &str) -> Option<ProgressEvent> {
    let caps = ITEMS_RE.captures(line)?;
    let current: u64 = caps[1].parse().ok()?;
    let total: u64 = caps[2].parse().ok()?;
    if total == 0 || current > total {
        return None;
    }
    Some(ProgressEvent::Progress(ProgressUpdate::new(
        ratio_percent(current as f64, total as f64),
        Stage::Downloading,
    )))
}

fn byte_ratio(line: &str) -> Option<ProgressEvent> {
    let caps = SIZES_RE.captures(line)?;
    let current = scaled_bytes(&caps[1], &caps[2])?;
    let total = scaled_bytes(&caps[3], &caps[4])?;
    if total <= 0.0 {
        return None;
    }
    Some(ProgressEvent::Progress(ProgressUpdate::new(
        ratio_percent(current, total),
        Stage::Downloading,
    )))
}

fn post_processing(line: &str) -> Option<ProgressEvent> {
    STAGE_MARKERS
        .iter()
        .find(|(marker, _, _)| line.contains(marker))
        .map(|&(_, percent, stage)| ProgressEvent::Progress(ProgressUpdate::new(percent, stage)))
}

fn completion(line: &str) -> Option<ProgressEvent> {
    COMPLETION_PHRASES
        .iter()
        .any(|phrase| line.contains(phrase))
        .then(|| ProgressEvent::Progress(ProgressUpdate::new(100, Stage::Completed)))
}

fn destination(line: &str) -> Option<ProgressEvent> {
    line.contains("[download] Destination:")
        .then(|| ProgressEvent::Progress(ProgressUpdate::new(0, Stage::Starting)))
}

fn error(line: &str) -> Option<ProgressEvent> {
    let lowered = line.to_ascii_lowercase();
    (lowered.contains("error") || lowered.contains("failed")).then(|| ProgressEvent::Failed {
        line: line.trim().to_string(),
    })
}
