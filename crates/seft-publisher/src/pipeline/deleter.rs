//! Deleter pool
//!
//! A file is removed from the remote store if and only if its publish was
//! confirmed. Records that failed to publish are dropped untouched.

use tracing::{debug, info, warn};

use super::pool::{PoolHandle, SharedReceiver, StageTally};
use super::record::{FileRecord, Settled};
use crate::remote::Session;

pub const POOL: &str = "deleter";

/// Start one worker per session
pub fn start(sessions: Vec<Session>, input: SharedReceiver<FileRecord<Settled>>) -> PoolHandle {
    PoolHandle::spawn(POOL, sessions, |_, session| run_worker(session, input.clone()))
}

async fn run_worker(mut session: Session, input: SharedReceiver<FileRecord<Settled>>) -> StageTally {
    let mut tally = StageTally::default();

    while let Some(record) = input.recv().await {
        if !record.is_deletable() {
            debug!(file = %record.name(), outcome = %record.outcome(), "Keeping unpublished file");
            continue;
        }

        match session.delete(record.name()).await {
            Ok(()) => {
                tally.succeeded += 1;
                info!(file = %record.name(), "Deleted from remote store");
            },
            Err(e) => {
                tally.failed += 1;
                warn!(file = %record.name(), error = %e, "Delete failed, file will be published again");
            },
        }
    }

    session.close().await;
    tally
}
