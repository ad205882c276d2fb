//! Health reporting
//!
//! Read-only reachability check of both ends of the pipeline, run fresh for
//! every request. The remote store probe opens its own session through the
//! factory, sends `NOOP` and closes it, so it never touches a pipeline
//! worker's session.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::ingest::IngestionEndpoint;
use crate::remote::SessionFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Failed,
}

impl Status {
    fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Status::Ok
        } else {
            Status::Failed
        }
    }
}

/// Health document served at `/healthcheck`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Status,
    pub remote_store: Status,
    pub ingestion_endpoint: Status,
}

impl HealthReport {
    pub fn new(remote_store: Status, ingestion_endpoint: Status) -> Self {
        let status = if remote_store == Status::Ok && ingestion_endpoint == Status::Ok {
            Status::Ok
        } else {
            Status::Failed
        };
        Self {
            status,
            remote_store,
            ingestion_endpoint,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

#[derive(Clone)]
pub struct HealthReporter {
    factory: Arc<SessionFactory>,
    endpoint: Arc<dyn IngestionEndpoint>,
    timeout: Duration,
}

impl HealthReporter {
    pub fn new(
        factory: Arc<SessionFactory>,
        endpoint: Arc<dyn IngestionEndpoint>,
        timeout: Duration,
    ) -> Self {
        Self {
            factory,
            endpoint,
            timeout,
        }
    }

    /// Probe both dependencies concurrently
    pub async fn check(&self) -> HealthReport {
        let (remote_store, ingestion_endpoint) =
            tokio::join!(self.probe_remote_store(), self.probe_ingestion_endpoint());

        let report = HealthReport::new(remote_store, ingestion_endpoint);
        if !report.is_ok() {
            warn!(
                remote_store = ?report.remote_store,
                ingestion_endpoint = ?report.ingestion_endpoint,
                "Health check failed"
            );
        }
        report
    }

    async fn probe_remote_store(&self) -> Status {
        let probe = async {
            let mut session = self.factory.acquire().await?;
            let result = session.noop().await;
            session.close().await;
            result
        };

        match tokio::time::timeout(self.timeout, probe).await {
            Ok(Ok(())) => Status::Ok,
            Ok(Err(e)) => {
                warn!(error = %e, "Remote store probe failed");
                Status::Failed
            },
            Err(_) => {
                warn!(address = %self.factory.address(), "Remote store probe timed out");
                Status::Failed
            },
        }
    }

    async fn probe_ingestion_endpoint(&self) -> Status {
        match tokio::time::timeout(self.timeout, self.endpoint.probe()).await {
            Ok(reachable) => Status::from_reachable(reachable),
            Err(_) => {
                warn!("Ingestion endpoint probe timed out");
                Status::Failed
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status_requires_both() {
        assert!(HealthReport::new(Status::Ok, Status::Ok).is_ok());
        assert!(!HealthReport::new(Status::Ok, Status::Failed).is_ok());
        assert!(!HealthReport::new(Status::Failed, Status::Ok).is_ok());
    }

    #[test]
    fn test_document_shape() {
        let json = serde_json::to_value(HealthReport::new(Status::Ok, Status::Failed)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "FAILED",
                "remote_store": "OK",
                "ingestion_endpoint": "FAILED"
            })
        );
    }
}
