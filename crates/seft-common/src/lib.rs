//! SEFT Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the SEFT publisher workspace.
//!
//! - **Error Handling**: [`SeftError`] for rejected settings
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Environment**: typed lookups used by configuration loaders
//!
//! # Example
//!
//! ```no_run
//! use seft_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::SeftError;
