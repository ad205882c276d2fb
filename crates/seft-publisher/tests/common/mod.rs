//! Common test utilities for SEFT publisher integration tests
//!
//! [`MockStore`] is an in-memory remote store. Sessions opened through
//! [`MockConnector`] read and mutate it, and the store records everything the
//! pipeline did to it: connects, retrieves, deletes, closes and the highest
//! number of retrieves that were in flight at the same time.
//!
//! The ingestion endpoint is a `wiremock` server driven through the real
//! `HttpIngestClient`.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{MockStore, TestHarness};
//!
//! #[tokio::test]
//! async fn test_transfer() {
//!     let store = MockStore::with_files(&[("a.xlsx", b"a")]);
//!     let harness = TestHarness::start(store.clone()).await;
//!     let report = harness.coordinator.run_cycle().await.unwrap();
//! }
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

use seft_publisher::config::{Config, ScheduleMode};
use seft_publisher::error::{TransferError, TransferResult};
use seft_publisher::health::HealthReporter;
use seft_publisher::ingest::HttpIngestClient;
use seft_publisher::pipeline::CycleCoordinator;
use seft_publisher::remote::{FileMeta, RemoteSession, Session, SessionConnector, SessionFactory};

pub const MOCK_ADDRESS: &str = "mock-ftp:21";

/// In-memory remote store shared by every mock session
#[derive(Default)]
pub struct MockStore {
    files: Mutex<Vec<(String, Vec<u8>)>>,
    failing_retrieves: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    refuse_connects: AtomicBool,
    /// Connects allowed before refusing; `None` means unlimited
    connect_budget: Mutex<Option<usize>>,
    fail_listing: AtomicBool,
    retrieve_delay: Mutex<Duration>,

    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub noops: AtomicUsize,
    retrieved: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,

    retrieves_in_flight: AtomicUsize,
    max_retrieves_in_flight: AtomicUsize,
    busy_sessions: Mutex<HashSet<usize>>,
    reentered: AtomicBool,
    next_session: AtomicUsize,
}

impl MockStore {
    pub fn with_files(files: &[(&str, &[u8])]) -> Arc<Self> {
        let store = Self::default();
        *store.files.lock().unwrap() = files
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_vec()))
            .collect();
        Arc::new(store)
    }

    pub fn empty() -> Arc<Self> {
        Self::with_files(&[])
    }

    pub fn fail_retrieve(&self, name: &str) {
        self.failing_retrieves.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_delete(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.to_string());
    }

    pub fn refuse_connects(&self, refuse: bool) {
        self.refuse_connects.store(refuse, Ordering::SeqCst);
    }

    /// Allow `budget` more successful connects, then refuse every other one
    pub fn limit_connects(&self, budget: usize) {
        *self.connect_budget.lock().unwrap() = Some(budget);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_retrieve_delay(&self, delay: Duration) {
        *self.retrieve_delay.lock().unwrap() = delay;
    }

    pub fn remaining(&self) -> Vec<String> {
        self.files.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn retrieved(&self) -> Vec<String> {
        self.retrieved.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn max_concurrent_retrieves(&self) -> usize {
        self.max_retrieves_in_flight.load(Ordering::SeqCst)
    }

    pub fn session_reentered(&self) -> bool {
        self.reentered.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn try_connect(&self) -> bool {
        if self.refuse_connects.load(Ordering::SeqCst) {
            return false;
        }
        let mut budget = self.connect_budget.lock().unwrap();
        match budget.as_mut() {
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            },
            None => true,
        }
    }

    fn enter(&self, session: usize) {
        if !self.busy_sessions.lock().unwrap().insert(session) {
            self.reentered.store(true, Ordering::SeqCst);
        }
    }

    fn leave(&self, session: usize) {
        self.busy_sessions.lock().unwrap().remove(&session);
    }
}

pub struct MockConnector {
    pub store: Arc<MockStore>,
}

#[async_trait]
impl SessionConnector for MockConnector {
    fn address(&self) -> String {
        MOCK_ADDRESS.to_string()
    }

    async fn connect(&self) -> TransferResult<Session> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        if !self.store.try_connect() {
            return Err(TransferError::Connect {
                address: self.address(),
                reason: "Connection refused".to_string(),
            });
        }

        self.store.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            id: self.store.next_session.fetch_add(1, Ordering::SeqCst),
            store: self.store.clone(),
        }))
    }
}

pub struct MockSession {
    id: usize,
    store: Arc<MockStore>,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn list(&mut self) -> TransferResult<Vec<FileMeta>> {
        if self.store.fail_listing.load(Ordering::SeqCst) {
            return Err(TransferError::List {
                path: "/".to_string(),
                reason: "550 Permission denied".to_string(),
            });
        }
        Ok(self.store.remaining().into_iter().map(FileMeta::file).collect())
    }

    async fn retrieve(&mut self, name: &str) -> TransferResult<Vec<u8>> {
        self.store.enter(self.id);
        let now = self.store.retrieves_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.max_retrieves_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.store.retrieve_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        self.store.retrieves_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.store.leave(self.id);
        self.store.retrieved.lock().unwrap().push(name.to_string());

        if self.store.failing_retrieves.lock().unwrap().contains(name) {
            return Err(TransferError::Retrieve {
                file: name.to_string(),
                reason: "451 Transfer aborted".to_string(),
            });
        }

        self.store
            .files
            .lock()
            .unwrap()
            .iter()
            .find(|(file, _)| file == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| TransferError::Retrieve {
                file: name.to_string(),
                reason: "550 No such file".to_string(),
            })
    }

    async fn delete(&mut self, name: &str) -> TransferResult<()> {
        self.store.enter(self.id);
        let refused = self.store.failing_deletes.lock().unwrap().contains(name);
        if !refused {
            self.store.files.lock().unwrap().retain(|(file, _)| file != name);
            self.store.deleted.lock().unwrap().push(name.to_string());
        }
        self.store.leave(self.id);

        if refused {
            return Err(TransferError::Delete {
                file: name.to_string(),
                reason: "550 Permission denied".to_string(),
            });
        }
        Ok(())
    }

    async fn noop(&mut self) -> TransferResult<()> {
        self.store.noops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.store.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Configuration with small pools, no initial delay and the given endpoint
pub fn test_config(ingest_url: &str) -> Config {
    let mut config = Config::default();
    config.ingest.base_url = ingest_url.to_string();
    config.ingest.timeout_secs = 5;
    config.pipeline.download_workers = 3;
    config.pipeline.publish_workers = 2;
    config.pipeline.delete_workers = 2;
    config.pipeline.queue_capacity = 2;
    config.schedule.mode = ScheduleMode::Once;
    config.schedule.initial_delay_ms = 0;
    config.schedule.interval_ms = 50;
    config.server.health_timeout_secs = 2;
    config
}

/// Everything a test needs, wired like `main` does but against fakes
pub struct TestHarness {
    pub store: Arc<MockStore>,
    pub ingest: MockServer,
    pub config: Config,
    pub factory: Arc<SessionFactory>,
    pub endpoint: Arc<HttpIngestClient>,
    pub coordinator: Arc<CycleCoordinator>,
}

impl TestHarness {
    pub async fn start(store: Arc<MockStore>) -> Self {
        let ingest = MockServer::start().await;
        let config = test_config(&ingest.uri());
        Self::with_config(store, ingest, config)
    }

    pub fn with_config(store: Arc<MockStore>, ingest: MockServer, config: Config) -> Self {
        let factory = Arc::new(SessionFactory::new(Arc::new(MockConnector {
            store: store.clone(),
        })));
        let endpoint = Arc::new(HttpIngestClient::new(config.ingest.clone()).unwrap());
        let coordinator = Arc::new(CycleCoordinator::new(
            factory.clone(),
            endpoint.clone(),
            config.pipeline.clone(),
            config.ftp.clone(),
        ));

        Self {
            store,
            ingest,
            config,
            factory,
            endpoint,
            coordinator,
        }
    }

    pub fn health(&self) -> HealthReporter {
        HealthReporter::new(
            self.factory.clone(),
            self.endpoint.clone(),
            self.config.server.health_timeout(),
        )
    }
}
