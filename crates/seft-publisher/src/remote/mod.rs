//! Remote store access
//!
//! A [`RemoteSession`] is one authenticated connection to the remote store.
//! Sessions are stateful and not safe for concurrent use, so every method
//! takes `&mut self` and a session is always owned by exactly one task.
//!
//! Sessions are only ever created through a [`SessionFactory`], which
//! serializes the connect+login handshake process-wide:
//!
//! ```rust,ignore
//! let factory = SessionFactory::new(Arc::new(FtpConnector::new(config.ftp.clone())));
//! let mut session = factory.acquire().await?;
//! let files = session.list().await?;
//! session.close().await;
//! ```

pub mod ftp;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{TransferError, TransferResult};

pub use ftp::{FtpConnector, FtpSession};

/// Owned, boxed session handed from the factory to its single user
pub type Session = Box<dyn RemoteSession>;

/// Entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: String,
    pub is_directory: bool,
    pub size: Option<u64>,
}

impl FileMeta {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size: None,
        }
    }
}

/// One connected, authenticated session with the remote store
///
/// Paths are relative to the working directory entered during the handshake.
#[async_trait]
pub trait RemoteSession: Send {
    /// List the working directory
    async fn list(&mut self) -> TransferResult<Vec<FileMeta>>;

    /// Read a whole file into memory
    async fn retrieve(&mut self, name: &str) -> TransferResult<Vec<u8>>;

    /// Remove a file
    async fn delete(&mut self, name: &str) -> TransferResult<()>;

    /// Cheap round trip proving the session is alive
    async fn noop(&mut self) -> TransferResult<()>;

    /// Log out and drop the connection; failures are logged, not returned
    async fn close(&mut self);
}

/// Performs the connect+authenticate handshake
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Address used in logs and errors
    fn address(&self) -> String;

    async fn connect(&self) -> TransferResult<Session>;
}

/// Hands out fresh sessions, one handshake at a time
///
/// The lock only covers the handshake. The returned session is owned by the
/// caller and never shared, so transfers on different sessions run in
/// parallel.
pub struct SessionFactory {
    connector: Arc<dyn SessionConnector>,
    handshake: Arc<Mutex<()>>,
}

impl SessionFactory {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            handshake: Arc::new(Mutex::new(())),
        }
    }

    pub fn address(&self) -> String {
        self.connector.address()
    }

    /// Open one session
    ///
    /// The handshake runs in its own task that owns the lock; the lock stays
    /// held until the handshake ends even if the caller stops waiting.
    pub async fn acquire(&self) -> TransferResult<Session> {
        let lock = Arc::clone(&self.handshake).lock_owned().await;
        let connector = Arc::clone(&self.connector);
        debug!(address = %connector.address(), "Opening remote session");

        let handshake = tokio::spawn(async move {
            let _lock = lock;
            connector.connect().await
        });

        handshake.await.map_err(|e| TransferError::Connect {
            address: self.connector.address(),
            reason: format!("Handshake task failed: {}", e),
        })?
    }

    /// Open up to `count` sessions for a worker pool
    ///
    /// Individual failures are logged and the pool runs with fewer workers;
    /// only when no session at all could be opened is the pool start aborted.
    pub async fn acquire_for_pool(
        &self,
        pool: &'static str,
        count: usize,
    ) -> TransferResult<Vec<Session>> {
        let mut sessions = Vec::with_capacity(count);
        for index in 0..count {
            match self.acquire().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(pool, worker = index, error = %e, "Could not open session for worker");
                },
            }
        }

        if sessions.is_empty() {
            return Err(TransferError::PoolStart { pool });
        }
        if sessions.len() < count {
            warn!(
                pool,
                requested = count,
                opened = sessions.len(),
                "Starting pool with fewer workers than configured"
            );
        }

        Ok(sessions)
    }
}
