//! Periodic dispatcher for the pending queue
//!
//! Every tick starts at most one sweep. A tick that arrives while a sweep is
//! still running is dropped, never queued. Sweep errors and panics are logged
//! and counted; they never stop the ticker.

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::EmailError;
use crate::services::SweepReport;

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Something that can deliver everything currently pending
#[async_trait]
pub trait PendingEmailProcessor: Send + Sync {
    async fn process_pending(&self) -> Result<SweepReport, EmailError>;
}

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub sweeps_started: u64,
    pub ticks_skipped: u64,
    pub sweeps_failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sweeps_started: AtomicU64,
    ticks_skipped: AtomicU64,
    sweeps_failed: AtomicU64,
}

/// Fixed-interval, single-flight driver for a [`PendingEmailProcessor`]
pub struct EmailDispatcher {
    processor: Arc<dyn PendingEmailProcessor>,
    interval: Duration,
    sweep_lock: Arc<Mutex<()>>,
    cancellation_token: CancellationToken,
    counters: Arc<Counters>,
}

impl EmailDispatcher {
    pub fn new(processor: Arc<dyn PendingEmailProcessor>, interval: Duration) -> Self {
        Self {
            processor,
            // tokio intervals reject a zero period
            interval: interval.max(Duration::from_millis(1)),
            sweep_lock: Arc::new(Mutex::new(())),
            cancellation_token: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start one sweep unless a sweep is already running or the dispatcher is stopped
    pub fn try_start_sweep(&self) -> Option<JoinHandle<()>> {
        if self.cancellation_token.is_cancelled() {
            return None;
        }

        let guard = match self.sweep_lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                self.counters.ticks_skipped.fetch_add(1, Ordering::SeqCst);
                warn!("Previous sweep still running, skipping this tick");
                return None;
            }
        };

        self.counters.sweeps_started.fetch_add(1, Ordering::SeqCst);
        let processor = self.processor.clone();
        let counters = self.counters.clone();

        Some(tokio::spawn(async move {
            // Held until the sweep is over
            let _guard = guard;

            match AssertUnwindSafe(processor.process_pending())
                .catch_unwind()
                .await
            {
                Ok(Ok(report)) => {
                    if report.skipped {
                        debug!("Sweep skipped, another process holds the lease");
                    } else if report.attempted > 0 {
                        info!(
                            "Sweep delivered {} of {} email(s)",
                            report.delivered, report.attempted
                        );
                    } else {
                        debug!("Sweep found nothing to deliver");
                    }
                }
                Ok(Err(e)) => {
                    counters.sweeps_failed.fetch_add(1, Ordering::SeqCst);
                    error!("Email sweep failed: {}", e);
                }
                Err(panic) => {
                    counters.sweeps_failed.fetch_add(1, Ordering::SeqCst);
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Email sweep panicked: {}", reason);
                }
            }
        }))
    }

    /// Tick until [`EmailDispatcher::stop`] is called, then wait for the in-flight sweep
    pub async fn run(&self) {
        info!("Email dispatcher started (interval {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("Email dispatcher received cancellation signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.try_start_sweep();
                }
            }
        }

        let _idle = self.sweep_lock.lock().await;
        info!("Email dispatcher stopped");
    }

    /// Run the dispatcher as a background task
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.run().await })
    }

    /// Stop ticking; a sweep already in progress finishes normally
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweep_lock.try_lock().is_err()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            sweeps_started: self.counters.sweeps_started.load(Ordering::SeqCst),
            ticks_skipped: self.counters.ticks_skipped.load(Ordering::SeqCst),
            sweeps_failed: self.counters.sweeps_failed.load(Ordering::SeqCst),
        }
    }
}
