//! Transfer pipeline
//!
//! ```text
//! lister ──names──▶ downloader pool ──content──▶ publisher pool ──outcome──▶ deleter pool
//! ```
//!
//! Each arrow is a bounded queue. Records move by ownership from one stage to
//! the next; no two workers ever share a record or a remote session.

pub mod cycle;
pub mod deleter;
pub mod downloader;
pub mod lister;
pub mod pool;
pub mod publisher;
pub mod record;

pub use cycle::{CycleCoordinator, CycleCounts, CycleReport, CycleState, CycleStatus};
pub use record::{FileRecord, Outcome};
