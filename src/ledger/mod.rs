//! In-memory job state
//!
//! Two independent stores live here:
//!
//! - [`JobRegistry`] owns every submitted job and its lifecycle
//!   (`QUEUED → RUNNING → DONE | ERROR`). Entries are never removed; retention
//!   is the caller's concern.
//! - [`ProgressStore`] keeps the latest [`ProgressSnapshot`] per job. A
//!   finished snapshot is dropped on the first read after its grace period,
//!   so a client always gets to see the terminal reading once.
//!
//! Both are plain values meant to be wrapped in an `Arc` and shared; nothing
//! here is process-global, so tests build isolated instances.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mediafetch::ledger::{JobRegistry, JobStatus, NewJob};
//!
//! let registry = JobRegistry::new();
//! let job = registry.create(new_job).await;
//! registry.transition(&job.id, JobStatus::Running, "Starting").await?;
//! ```

pub mod error;
pub mod jobs;
pub mod progress;

pub use error::{LedgerError, Result};
pub use jobs::{Job, JobRegistry, JobStatus, NewJob};
pub use progress::{DEFAULT_GRACE_PERIOD, ProgressSnapshot, ProgressStore};
