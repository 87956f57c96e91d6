use std::sync::Arc;
use std::time::Duration;

use postbox_email::EmailDispatcher;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Resolve on Ctrl+C; a failing signal handler counts as a shutdown request
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
}

/// Stop ticking and give the in-flight sweep `timeout` to finish
pub async fn stop_dispatcher(
    dispatcher: Arc<EmailDispatcher>,
    handle: JoinHandle<()>,
    timeout: Duration,
) {
    info!("Stopping email dispatcher...");
    dispatcher.stop();

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => {
            let stats = dispatcher.stats();
            info!(
                "Email dispatcher stopped after {} sweep(s), {} skipped tick(s), {} failed sweep(s)",
                stats.sweeps_started, stats.ticks_skipped, stats.sweeps_failed
            );
        }
        Ok(Err(e)) => warn!("Email dispatcher task ended abnormally: {}", e),
        Err(_) => warn!(
            "Shutdown timeout exceeded ({:?}) while a sweep was still running, forcing shutdown",
            timeout
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use postbox_email::{EmailError, PendingEmailProcessor, SweepReport};

    struct Idle;

    #[async_trait]
    impl PendingEmailProcessor for Idle {
        async fn process_pending(&self) -> Result<SweepReport, EmailError> {
            Ok(SweepReport::default())
        }
    }

    #[tokio::test]
    async fn test_stop_dispatcher_waits_for_run_loop() {
        let dispatcher = Arc::new(EmailDispatcher::new(
            Arc::new(Idle),
            Duration::from_millis(5),
        ));
        let handle = dispatcher.spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;

        stop_dispatcher(dispatcher.clone(), handle, Duration::from_secs(5)).await;

        assert!(!dispatcher.is_sweeping());
        assert!(dispatcher.stats().sweeps_started >= 1);
        assert!(dispatcher.try_start_sweep().is_none());
    }
}
