//! Bounded queues and worker pool lifecycle
//!
//! A queue is a bounded `mpsc` channel whose receiving end is shared by every
//! worker of the consuming pool, giving multi-producer/multi-consumer FIFO
//! semantics with backpressure. A queue closes once all of its senders are
//! dropped; workers then drain what is left and exit.

use futures::future::join_all;
use std::future::Future;
use std::ops::AddAssign;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

/// Consumer side of a queue, cloned once per worker
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedReceiver<T> {
    /// Next item, or `None` once the queue is closed and empty
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

/// Create a bounded queue
pub fn queue<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        tx,
        SharedReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Per-stage success/failure counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl AddAssign for StageTally {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Running workers of one pool
pub struct PoolHandle {
    pool: &'static str,
    workers: Vec<JoinHandle<StageTally>>,
}

impl PoolHandle {
    /// Spawn one task per worker; each runs inside a span named after the pool
    pub fn spawn<I, F, Fut>(pool: &'static str, inputs: I, worker: F) -> Self
    where
        I: IntoIterator,
        F: Fn(usize, I::Item) -> Fut,
        Fut: Future<Output = StageTally> + Send + 'static,
    {
        let workers: Vec<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| {
                let span = info_span!("worker", pool, worker = index);
                tokio::spawn(worker(index, input).instrument(span))
            })
            .collect();

        debug!(pool, workers = workers.len(), "Pool started");
        Self { pool, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait until every worker has exited and sum their tallies
    ///
    /// Workers exit once their input queue is closed and drained, so this is
    /// the stage barrier of a cycle.
    pub async fn wait_for_drain(self) -> StageTally {
        let pool = self.pool;
        let mut total = StageTally::default();

        for (worker, result) in join_all(self.workers).await.into_iter().enumerate() {
            match result {
                Ok(tally) => total += tally,
                Err(e) => error!(pool, worker, error = %e, "Worker terminated abnormally"),
            }
        }

        debug!(pool, succeeded = total.succeeded, failed = total.failed, "Pool drained");
        total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_is_shared_fifo() {
        let (tx, rx) = queue::<usize>(4);

        let handle = PoolHandle::spawn("test", 0..3, |_, _| {
            let rx = rx.clone();
            async move {
                let mut tally = StageTally::default();
                while rx.recv().await.is_some() {
                    tally.succeeded += 1;
                }
                tally
            }
        });
        drop(rx);

        for i in 0..25 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let total = handle.wait_for_drain().await;
        assert_eq!(total.succeeded, 25);
    }

    #[tokio::test]
    async fn test_send_fails_once_all_workers_exit() {
        let (tx, rx) = queue::<usize>(1);

        let handle = PoolHandle::spawn("test", 0..2, |_, _| {
            let _rx = rx.clone();
            async move { StageTally::default() }
        });
        drop(rx);
        assert_eq!(handle.size(), 2);
        handle.wait_for_drain().await;

        assert!(tx.send(1).await.is_err());
    }

    #[tokio::test]
    async fn test_panicking_worker_does_not_poison_drain() {
        let handle = PoolHandle::spawn("test", 0..2, |index, _| async move {
            if index == 0 {
                panic!("worker blew up");
            }
            StageTally {
                succeeded: 1,
                failed: 0,
            }
        });

        assert_eq!(handle.wait_for_drain().await.succeeded, 1);
    }
}
