//! Downloader pool
//!
//! Every worker owns one remote session for the whole cycle. A failed
//! retrieve drops the record; the file stays on the remote store and is
//! picked up again by a later cycle.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::pool::{PoolHandle, SharedReceiver, StageTally};
use super::record::{Downloaded, FileRecord, Listed};
use crate::remote::Session;

pub const POOL: &str = "downloader";

/// Start one worker per session
pub fn start(
    sessions: Vec<Session>,
    input: SharedReceiver<FileRecord<Listed>>,
    output: mpsc::Sender<FileRecord<Downloaded>>,
) -> PoolHandle {
    PoolHandle::spawn(POOL, sessions, |_, session| {
        run_worker(session, input.clone(), output.clone())
    })
}

async fn run_worker(
    mut session: Session,
    input: SharedReceiver<FileRecord<Listed>>,
    output: mpsc::Sender<FileRecord<Downloaded>>,
) -> StageTally {
    let mut tally = StageTally::default();

    while let Some(record) = input.recv().await {
        match session.retrieve(record.name()).await {
            Ok(content) => {
                tally.succeeded += 1;
                debug!(file = %record.name(), bytes = content.len(), "Downloaded");
                if output.send(record.with_content(content)).await.is_err() {
                    warn!("Publish queue closed, downloader stopping early");
                    break;
                }
            },
            Err(e) => {
                tally.failed += 1;
                warn!(file = %record.name(), error = %e, "Download failed, file left on remote store");
            },
        }
    }

    session.close().await;
    tally
}
