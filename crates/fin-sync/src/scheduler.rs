//! Background scheduling with adaptive backoff.
//!
//! The interval logic lives in [`BackoffState`], pure and separately
//! testable; the runner task wires it to the service, a connectivity watch
//! channel, and a cancellation token.
//!
//! Policy: after a successful cycle the next attempt is due after the base
//! interval; each failure doubles the interval up to the cap; after the
//! configured number of consecutive failures the scheduler self-disables
//! and only a successful manual sync re-arms it. Going offline cancels the
//! pending attempt; coming back online re-arms immediately at the base
//! interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{SyncError, SyncMode, SyncService};

/// Pure backoff state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffState {
    base: Duration,
    max: Duration,
    max_failures: u32,
    interval: Duration,
    consecutive_failures: u32,
    disabled: bool,
}

impl BackoffState {
    pub fn new(base: Duration, max: Duration, max_failures: u32) -> Self {
        Self {
            base,
            max,
            max_failures,
            interval: base,
            consecutive_failures: 0,
            disabled: false,
        }
    }

    /// Delay before the next scheduled attempt.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.interval = self.base;
        self.disabled = false;
    }

    pub fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.max_failures {
            self.disabled = true;
        } else {
            self.interval = (self.interval * 2).min(self.max);
        }
    }

    /// Connectivity came back: the next attempt is due one base interval
    /// from now. A disabled scheduler stays disabled.
    pub fn on_reconnect(&mut self) {
        self.interval = self.base;
    }

    /// A successful manual sync re-arms a disabled scheduler.
    pub fn re_arm(&mut self) {
        self.disabled = false;
        self.consecutive_failures = 0;
        self.interval = self.base;
    }
}

/// Owns the background task driving periodic bidirectional syncs.
pub struct SyncScheduler {
    service: Arc<SyncService>,
    online: watch::Receiver<bool>,
}

impl SyncScheduler {
    /// `online` carries connectivity transitions; `true` means the remote
    /// should be reachable.
    pub fn new(service: Arc<SyncService>, online: watch::Receiver<bool>) -> Self {
        Self { service, online }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let rearm = Arc::new(Notify::new());
        let task = tokio::spawn(run_loop(
            self.service,
            self.online,
            cancel.clone(),
            Arc::clone(&rearm),
        ));
        SchedulerHandle {
            cancel,
            rearm,
            task,
        }
    }
}

pub struct SchedulerHandle {
    cancel: CancellationToken,
    rearm: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Report a successful manual sync; re-arms a self-disabled scheduler.
    pub fn notify_manual_success(&self) {
        self.rearm.notify_one();
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

async fn run_loop(
    service: Arc<SyncService>,
    mut online: watch::Receiver<bool>,
    cancel: CancellationToken,
    rearm: Arc<Notify>,
) {
    let config = *service.config();
    let mut backoff = BackoffState::new(
        config.base_interval,
        config.max_interval,
        config.max_consecutive_failures,
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if !*online.borrow() {
            info!("offline: background sync paused");
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *online.borrow() {
                        info!("back online: background sync re-armed");
                        backoff.on_reconnect();
                    }
                    continue;
                }
            }
        }

        if backoff.is_disabled() {
            warn!(
                failures = backoff.consecutive_failures(),
                "background sync disabled; waiting for a successful manual sync"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = rearm.notified() => {
                    backoff.re_arm();
                    continue;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = online.changed() => {
                // Going offline cancels the pending attempt; any transition
                // back online restarts from the base interval.
                if changed.is_err() {
                    break;
                }
                if *online.borrow() {
                    backoff.on_reconnect();
                }
                continue;
            }
            _ = rearm.notified() => {
                backoff.re_arm();
                continue;
            }
            _ = tokio::time::sleep(backoff.interval()) => {
                match service.sync(SyncMode::Bidirectional).await {
                    Ok(report) => {
                        backoff.on_success();
                        info!(
                            uploaded = report.total_uploaded(),
                            downloaded = report.total_downloaded(),
                            "scheduled sync complete"
                        );
                    }
                    // A manual cycle holds the slot; try again later.
                    Err(SyncError::AlreadyRunning) => {}
                    Err(e) => {
                        backoff.on_failure();
                        warn!(
                            error = %e,
                            failures = backoff.consecutive_failures(),
                            next_interval_secs = backoff.interval().as_secs(),
                            "scheduled sync failed"
                        );
                    }
                }
            }
        }
    }
}
