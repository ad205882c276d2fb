//! Publisher pool
//!
//! Uploads each downloaded record and forwards it, settled, to the deleter
//! whatever the result. No retry within a cycle: a rejected file stays on
//! the remote store and is listed again next time.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::pool::{PoolHandle, SharedReceiver, StageTally};
use super::record::{Downloaded, FileRecord, Settled};
use crate::error::TransferError;
use crate::ingest::IngestionEndpoint;

pub const POOL: &str = "publisher";

/// Start `workers` publishers sharing one endpoint client
pub fn start(
    workers: usize,
    endpoint: Arc<dyn IngestionEndpoint>,
    input: SharedReceiver<FileRecord<Downloaded>>,
    output: mpsc::Sender<FileRecord<Settled>>,
) -> PoolHandle {
    PoolHandle::spawn(POOL, 0..workers, |_, _| {
        run_worker(endpoint.clone(), input.clone(), output.clone())
    })
}

async fn run_worker(
    endpoint: Arc<dyn IngestionEndpoint>,
    input: SharedReceiver<FileRecord<Downloaded>>,
    output: mpsc::Sender<FileRecord<Settled>>,
) -> StageTally {
    let mut tally = StageTally::default();

    while let Some(record) = input.recv().await {
        let (name, content) = record.into_upload();
        let size = content.len();

        let ingested = match endpoint.publish(&name, content).await {
            Ok(()) => {
                tally.succeeded += 1;
                info!(file = %name, bytes = size, "Published");
                true
            },
            Err(TransferError::Publish { status, reason, .. }) => {
                tally.failed += 1;
                warn!(file = %name, status = ?status, error = %reason, "Publish failed");
                false
            },
            Err(e) => {
                tally.failed += 1;
                warn!(file = %name, error = %e, "Publish failed");
                false
            },
        };

        if output.send(FileRecord::<Settled>::settle(name, ingested)).await.is_err() {
            warn!("Delete queue closed, publisher stopping early");
            break;
        }
    }

    tally
}
