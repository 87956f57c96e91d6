mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use postbox_config::DEFAULT_SWEEP_INTERVAL_SECS;
use postbox_email::{EmailDispatcher, SmtpMailTransport};
use tracing::{info, warn};

use super::context::{AppContext, ConnectionArgs, SmtpArgs};

#[derive(Args)]
pub struct ServeCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub smtp: SmtpArgs,

    /// Seconds between sweeps of the pending queue
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS, env = "POSTBOX_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: u64,

    /// Seconds to wait for an in-flight sweep on shutdown
    #[arg(long, default_value_t = 30, env = "POSTBOX_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,

    /// Check the SMTP connection before starting the dispatcher
    #[arg(long)]
    pub verify_smtp: bool,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let mut config = self
            .connection
            .to_config()
            .with_sweep_interval_secs(self.sweep_interval_secs);
        if let Some(smtp) = self.smtp.to_settings()? {
            config = config.with_smtp(smtp);
        }
        let smtp = config.smtp_settings()?.clone();

        if self.verify_smtp {
            info!("Checking SMTP connection to {}:{}", smtp.host, smtp.port);
            if !SmtpMailTransport::new(&smtp)?.test_connection().await? {
                anyhow::bail!("SMTP server {}:{} did not accept the connection", smtp.host, smtp.port);
            }
        }

        let ctx = AppContext::connect(config).await?;
        let dispatcher = Arc::new(EmailDispatcher::new(
            ctx.service.clone(),
            ctx.config.sweep_interval(),
        ));
        let handle = dispatcher.spawn();

        info!(
            "Postbox dispatcher running, sending through {}:{} every {:?}",
            smtp.host,
            smtp.port,
            dispatcher.interval()
        );

        shutdown::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");

        if dispatcher.is_sweeping() {
            warn!("A sweep is in progress, waiting for it to finish");
        }
        shutdown::stop_dispatcher(
            dispatcher,
            handle,
            Duration::from_secs(self.shutdown_timeout_secs),
        )
        .await;

        Ok(())
    }
}
