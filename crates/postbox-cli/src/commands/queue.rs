use clap::Args;
use colored::Colorize;
use postbox_email::DeliveryState;
use tracing::info;

use super::context::{AppContext, ConnectionArgs, SmtpArgs};

#[derive(Args)]
pub struct UnsentCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl UnsentCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let ctx = AppContext::connect(self.connection.to_config()).await?;
        let pending = ctx.service.list_unsent().await?;

        if pending.is_empty() {
            println!("{}", "Queue is empty".bright_green());
            return Ok(());
        }

        for email in &pending {
            let cc = if email.cc_receivers.is_empty() {
                String::new()
            } else {
                format!(" cc {}", email.cc_receivers.join(", "))
            };
            println!(
                "{}  {}  {}{}",
                email.id.to_string().dimmed(),
                email.created_on.format("%Y-%m-%d %H:%M:%S"),
                email.receiver.bright_white(),
                cc
            );
        }
        println!("{} pending email(s)", pending.len());
        Ok(())
    }
}

#[derive(Args)]
pub struct SweepCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub smtp: SmtpArgs,
}

impl SweepCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let mut config = self.connection.to_config();
        if let Some(smtp) = self.smtp.to_settings()? {
            config = config.with_smtp(smtp);
        }
        config.smtp_settings()?;

        let ctx = AppContext::connect(config).await?;
        let report = ctx.service.process_pending().await?;
        if report.skipped {
            println!(
                "{}",
                "Another sweep is running against this database, nothing was sent".bright_yellow()
            );
            return Ok(());
        }
        info!(
            "Manual sweep finished: {} attempted, {} delivered, {} failed",
            report.attempted, report.delivered, report.failed
        );

        println!(
            "{} attempted, {} delivered, {} failed",
            report.attempted,
            report.delivered.to_string().bright_green(),
            report.failed.to_string().bright_red()
        );
        Ok(())
    }
}

#[derive(Args)]
pub struct StatsCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl StatsCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let ctx = AppContext::connect(self.connection.to_config()).await?;
        let stats = ctx.service.stats().await?;

        println!("{:<10} {}", "total", stats.total);
        println!(
            "{:<10} {}",
            DeliveryState::Pending.to_string(),
            stats.pending.to_string().bright_yellow()
        );
        println!(
            "{:<10} {}",
            DeliveryState::Delivered.to_string(),
            stats.delivered.to_string().bright_green()
        );
        println!(
            "{:<10} {}",
            DeliveryState::Failed.to_string(),
            stats.failed.to_string().bright_red()
        );
        Ok(())
    }
}
