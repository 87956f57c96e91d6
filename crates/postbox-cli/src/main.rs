//! Postbox CLI - single entrypoint for the dispatcher and queue administration

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AttachmentCommand, EnqueueCommand, ServeCommand, StatsCommand, SweepCommand,
    TemplateCommand, UnsentCommand,
};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "POSTBOX_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "POSTBOX_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the email dispatcher until Ctrl+C
    Serve(ServeCommand),
    /// Manage email templates
    Template(TemplateCommand),
    /// Manage stored attachments
    Attachment(AttachmentCommand),
    /// Queue an email for delivery
    Enqueue(EnqueueCommand),
    /// List emails that have not been processed yet
    Unsent(UnsentCommand),
    /// Deliver everything pending right now
    Sweep(SweepCommand),
    /// Show delivery counts
    Stats(StatsCommand),
}

fn default_filter(level: &str) -> String {
    format!(
        "postbox={level},\
         postbox_cli={level},\
         postbox_config={level},\
         postbox_core={level},\
         postbox_database={level},\
         postbox_email={level},\
         postbox_entities={level},\
         postbox_migrations={level},\
         sqlx=warn,\
         sea_orm=warn,\
         sea_orm_migration=warn,\
         lettre=warn,\
         rustls=warn",
        level = level
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(default_filter(&cli.log_level))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Serve(cmd) => cmd.execute(),
        Commands::Template(cmd) => cmd.execute(),
        Commands::Attachment(cmd) => cmd.execute(),
        Commands::Enqueue(cmd) => cmd.execute(),
        Commands::Unsent(cmd) => cmd.execute(),
        Commands::Sweep(cmd) => cmd.execute(),
        Commands::Stats(cmd) => cmd.execute(),
    }
}
