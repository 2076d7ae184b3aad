//! Artifact resolution and retrieval
//!
//! The downloader does not print a reliable, machine-readable completion
//! record, so the produced file is located after the process exits: first from
//! the paths it announced in its output, then by scanning the target directory.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No output file found in {}", .dir.display())]
    NotFound { dir: PathBuf },

    #[error("Artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Lines that name the file being written, in any of the shapes the tool uses
static ANNOUNCEMENT_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\[download\] Destination:\s*(.+)",
        r"\[ExtractAudio\] Destination:\s*(.+)",
        r#"\[Merger\] Merging formats into "(.+)""#,
        r"\[download\] (.+?) has already been downloaded",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("announcement regex"))
    .collect()
});

const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// Paths announced in `output`, in the order they appeared
pub fn announced_paths(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            ANNOUNCEMENT_RES
                .iter()
                .find_map(|re| re.captures(line.trim_end()))
                .map(|caps| caps[1].trim().to_string())
        })
        .filter(|path| !path.is_empty())
        .collect()
}

/// Determine which file a successful fetch produced.
///
/// Announced paths are tried latest first, relative ones resolved against
/// `target_dir`. When none names an existing non-empty file, the most recently
/// modified file in `target_dir` is chosen; with `stem` set, only files named
/// `<stem>.<ext>` are considered.
pub async fn resolve_artifact(
    output: &str,
    target_dir: &Path,
    stem: Option<&str>,
) -> Result<PathBuf> {
    for announced in announced_paths(output).iter().rev() {
        let candidate = target_dir.join(announced);
        if is_non_empty_file(&candidate).await {
            info!(path = %candidate.display(), "Resolved artifact from output");
            return Ok(candidate);
        }
        debug!(path = %candidate.display(), "Announced path is missing or empty");
    }

    let newest = newest_file(target_dir, stem).await?;
    match newest {
        Some(path) if is_non_empty_file(&path).await => {
            info!(path = %path.display(), "Resolved artifact from directory scan");
            Ok(path)
        }
        _ => Err(ArtifactError::NotFound {
            dir: target_dir.to_path_buf(),
        }),
    }
}

/// Open a resolved artifact for streaming, returning the handle and its length
pub async fn open_artifact(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path).await?;
    let size = file.metadata().await?.len();
    debug!(path = %path.display(), size, "Opened artifact");
    Ok((file, size))
}

/// File name used for `Content-Disposition`
pub fn artifact_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn is_candidate(name: &str, stem: Option<&str>) -> bool {
    if name.starts_with('.') || PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return false;
    }
    match stem {
        Some(stem) => name
            .strip_prefix(stem)
            .is_some_and(|rest| rest.starts_with('.')),
        None => true,
    }
}

async fn newest_file(dir: &Path, stem: Option<&str>) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !is_candidate(&name.to_string_lossy(), stem) {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(best, _)| modified > *best) {
            newest = Some((modified, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
