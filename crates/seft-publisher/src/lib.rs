//! SEFT Publisher Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Moves files from an FTP drop folder to an HTTP ingestion service.
//!
//! # Overview
//!
//! Every cycle runs the transfer pipeline once:
//!
//! - **Lister**: one session lists the working directory
//! - **Downloader pool**: N workers, one FTP session each, retrieve content
//! - **Publisher pool**: M workers upload each file to the ingestion endpoint
//! - **Deleter pool**: K workers, one FTP session each, remove a file only
//!   after its upload was confirmed with HTTP 200
//!
//! Stages are joined by bounded queues, so a slow endpoint holds back
//! downloads instead of filling memory. FTP handshakes go through a
//! [`remote::SessionFactory`] that performs one login at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seft_publisher::config::Config;
//! use seft_publisher::ingest::HttpIngestClient;
//! use seft_publisher::pipeline::CycleCoordinator;
//! use seft_publisher::remote::{FtpConnector, SessionFactory};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let factory = Arc::new(SessionFactory::new(Arc::new(FtpConnector::new(config.ftp.clone()))));
//! let endpoint = Arc::new(HttpIngestClient::new(config.ingest.clone())?);
//!
//! let coordinator = CycleCoordinator::new(factory, endpoint, config.pipeline, config.ftp);
//! let report = coordinator.run_cycle().await?;
//! println!("published {} files", report.counts.published);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod pipeline;
pub mod remote;
pub mod scheduler;

pub use config::Config;
pub use error::{TransferError, TransferResult};
