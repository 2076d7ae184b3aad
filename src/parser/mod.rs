//! Downloader output parsing
//!
//! Turns the free-form lines printed by the external downloader into
//! [`ProgressEvent`]s. Parsing is a pure function of the line: an ordered
//! table of [`Rule`]s is tried top to bottom and the first rule that yields
//! an event wins.
//!
//! ```rust
//! use mediafetch::parser::{parse_line, Stage};
//!
//! let event = parse_line("[download]  45.5% of 10.00MiB at 1.20MiB/s ETA 00:07").unwrap();
//! assert_eq!(event.percent(), Some(46));
//! assert!(parse_line("[youtube] abc: Downloading webpage").is_none());
//! # let _ = Stage::Downloading;
//! ```

mod rules;
mod types;

pub use rules::{RULES, Rule, clamp_percent, parse_line};
pub use types::{ProgressEvent, ProgressUpdate, Stage};
