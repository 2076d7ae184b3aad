//! Video metadata lookup
//!
//! A lookup validates the URL, consults the [`MetadataCache`], and on a miss
//! runs the downloader in describe mode (`--dump-json`) and parses the
//! document it prints.

mod cache;
mod parse;
mod types;
pub mod url;

pub use cache::{MetadataCache, describe_args};
pub use parse::parse_metadata;
pub use types::{FormatOption, VideoMetadata};

use crate::worker::process::ProcessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Describe failed: {0}")]
    Process(#[from] ProcessError),

    #[error("Could not interpret metadata: {0}")]
    ParseFailure(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
