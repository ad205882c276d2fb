//! Cycle coordination
//!
//! One cycle lists the remote directory, wires the three pools together,
//! feeds the listed names in and waits for every pool to drain. The
//! coordinator is `Idle` or `Running`; a second cycle is refused while one is
//! in flight. Every finished cycle, aborted or not, leaves a [`CycleReport`]
//! in a small in-memory history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::pool::{queue, PoolHandle, StageTally};
use super::record::FileRecord;
use super::{deleter, downloader, lister, publisher};
use crate::config::{FtpConfig, PipelineConfig};
use crate::error::{TransferError, TransferResult};
use crate::ingest::IngestionEndpoint;
use crate::remote::SessionFactory;

/// Number of reports kept for the operator API
pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    Aborted { reason: String },
}

/// File counts of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleCounts {
    pub discovered: usize,
    pub downloaded: usize,
    pub download_failed: usize,
    pub published: usize,
    pub publish_failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
}

impl CycleCounts {
    fn record(&mut self, download: StageTally, publish: StageTally, delete: StageTally) {
        self.downloaded = download.succeeded;
        self.download_failed = download.failed;
        self.published = publish.succeeded;
        self.publish_failed = publish.failed;
        self.deleted = delete.succeeded;
        self.delete_failed = delete.failed;
    }
}

/// Outcome of one cycle, for observability only
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub counts: CycleCounts,
    #[serde(flatten)]
    pub status: CycleStatus,
}

impl CycleReport {
    pub fn is_completed(&self) -> bool {
        self.status == CycleStatus::Completed
    }
}

/// Most recent reports, newest first
#[derive(Default)]
pub struct CycleHistory {
    reports: RwLock<VecDeque<CycleReport>>,
}

impl CycleHistory {
    pub async fn push(&self, report: CycleReport) {
        let mut reports = self.reports.write().await;
        reports.push_front(report);
        reports.truncate(HISTORY_LIMIT);
    }

    pub async fn recent(&self) -> Vec<CycleReport> {
        self.reports.read().await.iter().cloned().collect()
    }
}

/// Resets the coordinator to `Idle` however the cycle ends
struct RunningGuard<'a>(&'a watch::Sender<CycleState>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(CycleState::Idle);
    }
}

/// Runs transfer cycles
pub struct CycleCoordinator {
    factory: Arc<SessionFactory>,
    endpoint: Arc<dyn IngestionEndpoint>,
    pipeline: PipelineConfig,
    ftp: FtpConfig,
    state: watch::Sender<CycleState>,
    history: CycleHistory,
}

impl CycleCoordinator {
    pub fn new(
        factory: Arc<SessionFactory>,
        endpoint: Arc<dyn IngestionEndpoint>,
        pipeline: PipelineConfig,
        ftp: FtpConfig,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            factory,
            endpoint,
            pipeline,
            ftp,
            state,
            history: CycleHistory::default(),
        }
    }

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    pub async fn recent(&self) -> Vec<CycleReport> {
        self.history.recent().await
    }

    /// Run one full cycle
    ///
    /// Returns `Err(CycleAlreadyRunning)` if a cycle is in flight. Every other
    /// failure is contained: an aborted cycle still returns its report.
    pub async fn run_cycle(&self) -> TransferResult<CycleReport> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == CycleState::Running {
                return false;
            }
            *state = CycleState::Running;
            true
        });
        if !claimed {
            warn!("Cycle requested while another is running, skipping");
            return Err(TransferError::CycleAlreadyRunning);
        }
        let _running = RunningGuard(&self.state);

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let span = info_span!("cycle", %cycle_id);

        let mut counts = CycleCounts::default();
        let result = self.execute(&mut counts).instrument(span.clone()).await;

        let status = match result {
            Ok(()) => CycleStatus::Completed,
            Err(e) => {
                span.in_scope(|| error!(error = %e, "Cycle aborted"));
                CycleStatus::Aborted {
                    reason: e.to_string(),
                }
            },
        };

        let report = CycleReport {
            cycle_id,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            counts,
            status,
        };

        span.in_scope(|| {
            info!(
                elapsed_ms = report.elapsed_ms,
                discovered = counts.discovered,
                downloaded = counts.downloaded,
                download_failed = counts.download_failed,
                published = counts.published,
                publish_failed = counts.publish_failed,
                deleted = counts.deleted,
                delete_failed = counts.delete_failed,
                "Cycle finished"
            )
        });

        self.history.push(report.clone()).await;
        Ok(report)
    }

    async fn execute(&self, counts: &mut CycleCounts) -> TransferResult<()> {
        info!("Starting transfer cycle");

        let names = lister::list_files(&self.factory, &self.ftp).await?;
        counts.discovered = names.len();
        if names.is_empty() {
            info!("No files to transfer");
            return Ok(());
        }

        let capacity = self.pipeline.queue_capacity;
        let (download_tx, download_rx) = queue(capacity);
        let (publish_tx, publish_rx) = queue(capacity);
        let (delete_tx, delete_rx) = queue(capacity);

        // Downstream pools start first so nothing is fed into a stage that
        // does not exist yet.
        let delete_sessions = self
            .factory
            .acquire_for_pool(deleter::POOL, self.pipeline.delete_workers)
            .await?;
        let deleters = deleter::start(delete_sessions, delete_rx);
        let publishers = publisher::start(
            self.pipeline.publish_workers,
            self.endpoint.clone(),
            publish_rx,
            delete_tx,
        );

        let download_sessions = match self
            .factory
            .acquire_for_pool(downloader::POOL, self.pipeline.download_workers)
            .await
        {
            Ok(sessions) => sessions,
            Err(e) => {
                // Dropping the publish sender closes the downstream queues;
                // the started pools drain empty and close their sessions.
                drop(publish_tx);
                drain(publishers, deleters).await;
                return Err(e);
            },
        };
        let downloaders = downloader::start(download_sessions, download_rx, publish_tx);

        info!(
            files = names.len(),
            downloaders = downloaders.size(),
            publishers = publishers.size(),
            deleters = deleters.size(),
            "Pools started"
        );

        for name in names {
            if download_tx.send(FileRecord::new(name)).await.is_err() {
                warn!("Every downloader exited, remaining files wait for the next cycle");
                break;
            }
        }
        drop(download_tx);

        let download = downloaders.wait_for_drain().await;
        let (publish, delete) = drain(publishers, deleters).await;
        counts.record(download, publish, delete);

        Ok(())
    }
}

async fn drain(publishers: PoolHandle, deleters: PoolHandle) -> (StageTally, StageTally) {
    let publish = publishers.wait_for_drain().await;
    let delete = deleters.wait_for_drain().await;
    (publish, delete)
}
