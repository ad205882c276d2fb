//! Cycle scheduling
//!
//! Drives the [`CycleCoordinator`] in one of four modes (see
//! [`ScheduleMode`]). A manual trigger starts the next cycle early in every
//! periodic mode; triggers arriving while a cycle runs collapse into a single
//! follow-up cycle. Shutdown is only observed between cycles, so a running
//! cycle always drains.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::{ScheduleConfig, ScheduleMode};
use crate::pipeline::CycleCoordinator;

/// Requests a cycle from outside the scheduler
#[derive(Clone, Default)]
pub struct TriggerHandle {
    notify: Arc<Notify>,
}

impl TriggerHandle {
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    async fn fired(&self) {
        self.notify.notified().await;
    }
}

pub struct Scheduler {
    coordinator: Arc<CycleCoordinator>,
    config: ScheduleConfig,
    trigger: TriggerHandle,
}

impl Scheduler {
    pub fn new(coordinator: Arc<CycleCoordinator>, config: ScheduleConfig) -> Self {
        Self {
            coordinator,
            config,
            trigger: TriggerHandle::default(),
        }
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    /// Run until shutdown is signalled (or after one cycle in `once` mode)
    ///
    /// Returns the number of cycles started.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mode = self.config.mode;
        info!(?mode, interval_ms = self.config.interval_ms, "Scheduler started");

        let initial_delay = self.config.initial_delay();
        if mode != ScheduleMode::Trigger
            && !initial_delay.is_zero()
            && !self.pause(initial_delay, &mut shutdown).await
        {
            info!("Scheduler stopped before the first cycle");
            return 0;
        }

        let cycles = match mode {
            ScheduleMode::Once => {
                self.run_cycle().await;
                1
            },
            ScheduleMode::Interval => self.run_interval(&mut shutdown).await,
            ScheduleMode::FixedRate => self.run_fixed_rate(&mut shutdown).await,
            ScheduleMode::Trigger => self.run_on_trigger(&mut shutdown).await,
        };

        info!(cycles, "Scheduler stopped");
        cycles
    }

    /// Wait `interval` after each cycle completes
    async fn run_interval(&self, shutdown: &mut watch::Receiver<bool>) -> usize {
        let mut cycles = 0;
        while !*shutdown.borrow() {
            self.run_cycle().await;
            cycles += 1;
            if !self.pause(self.config.interval(), shutdown).await {
                break;
            }
        }
        cycles
    }

    /// Start a cycle on every tick; ticks missed during a long cycle are skipped
    async fn run_fixed_rate(&self, shutdown: &mut watch::Receiver<bool>) -> usize {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = self.trigger.fired() => info!("Manual trigger received"),
                _ = stop_requested(shutdown) => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.run_cycle().await;
            cycles += 1;
        }
        cycles
    }

    async fn run_on_trigger(&self, shutdown: &mut watch::Receiver<bool>) -> usize {
        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = self.trigger.fired() => info!("Manual trigger received"),
                _ = stop_requested(shutdown) => break,
            }
            self.run_cycle().await;
            cycles += 1;
        }
        cycles
    }

    /// Sleep for `delay`, ending early on a trigger; `false` means shut down
    async fn pause(&self, delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.trigger.fired() => {
                info!("Manual trigger received");
                true
            },
            _ = stop_requested(shutdown) => false,
        }
    }

    async fn run_cycle(&self) {
        match self.coordinator.run_cycle().await {
            Ok(report) if report.is_completed() => {},
            Ok(_) => warn!("Cycle aborted, retrying at the next scheduled run"),
            Err(e) => warn!(error = %e, "Cycle not started"),
        }
    }
}

/// Resolves once shutdown is requested or its sender is gone
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_permits_coalesce() {
        let trigger = TriggerHandle::default();
        trigger.fire();
        trigger.fire();
        trigger.fire();

        trigger.fired().await;
        let second = tokio::time::timeout(Duration::from_millis(50), trigger.fired()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_stop_requested_on_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), stop_requested(&mut rx))
            .await
            .unwrap();
    }
}
