//! Shared connection flags and service wiring for every command

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use clap::Args;
use postbox_config::ServerConfig;
use postbox_core::{CipherMode, XxHash64Fingerprint};
use postbox_database::establish_connection;
use postbox_email::{
    EmailError, EmailService, MailTransport, OutgoingMail, SmtpMailTransport, SmtpSettings,
    TlsMode,
};
use tracing::debug;

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database connection URL
    #[arg(long, env = "POSTBOX_DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, default_value_t = 10, env = "POSTBOX_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Minimum pooled database connections
    #[arg(long, default_value_t = 1, env = "POSTBOX_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Base64 encoded 256-bit encryption key
    #[arg(long, env = "POSTBOX_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Base64 encoded 128-bit IV (cbc mode only)
    #[arg(long, env = "POSTBOX_ENCRYPTION_IV", hide_env_values = true)]
    pub encryption_iv: Option<String>,

    /// Cipher used for stored fields: cbc, gcm
    #[arg(long, default_value = "cbc", env = "POSTBOX_CIPHER_MODE")]
    pub cipher_mode: CipherMode,
}

impl ConnectionArgs {
    pub fn to_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.database_url.clone()).with_encryption(
            self.cipher_mode,
            self.encryption_key.clone(),
            self.encryption_iv.clone(),
        );
        config.db_max_connections = self.db_max_connections;
        config.db_min_connections = self.db_min_connections;
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct SmtpArgs {
    /// SMTP relay host
    #[arg(long, env = "POSTBOX_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, default_value_t = 587, env = "POSTBOX_SMTP_PORT")]
    pub smtp_port: u16,

    #[arg(long, env = "POSTBOX_SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "POSTBOX_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Address used in the From header
    #[arg(long, env = "POSTBOX_SMTP_SENDER")]
    pub smtp_sender: Option<String>,

    #[arg(long, env = "POSTBOX_SMTP_SENDER_NAME")]
    pub smtp_sender_name: Option<String>,

    /// Connection security: none, starttls, tls
    #[arg(long, default_value = "starttls", env = "POSTBOX_SMTP_TLS_MODE")]
    pub smtp_tls_mode: TlsMode,

    /// Accept self-signed certificates
    #[arg(long, env = "POSTBOX_SMTP_ACCEPT_INVALID_CERTS")]
    pub smtp_accept_invalid_certs: bool,
}

impl SmtpArgs {
    /// `None` when no host is configured
    pub fn to_settings(&self) -> anyhow::Result<Option<SmtpSettings>> {
        let Some(host) = self.smtp_host.as_deref().filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };
        let Some(sender) = self.smtp_sender.as_deref() else {
            bail!("--smtp-sender (POSTBOX_SMTP_SENDER) is required when an SMTP host is set");
        };

        let mut settings = SmtpSettings::new(host, sender);
        settings.port = self.smtp_port;
        settings.username = self.smtp_username.clone();
        settings.password = self.smtp_password.clone();
        settings.sender_name = self.smtp_sender_name.clone();
        settings.tls_mode = self.smtp_tls_mode;
        settings.accept_invalid_certs = self.smtp_accept_invalid_certs;
        Ok(Some(settings))
    }
}

/// Connected database plus the services built on it
pub struct AppContext {
    pub config: ServerConfig,
    pub service: Arc<EmailService>,
}

impl AppContext {
    pub async fn connect(config: ServerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let cipher = config.cipher()?;

        let transport: Arc<dyn MailTransport> = match &config.smtp {
            Some(settings) => Arc::new(SmtpMailTransport::new(settings)?),
            None => Arc::new(DisabledTransport),
        };

        debug!("Initializing database connection...");
        let db = establish_connection(&config.database_config()).await?;

        let service = Arc::new(EmailService::new(
            db,
            cipher,
            Arc::new(XxHash64Fingerprint::default()),
            transport,
        ));

        Ok(Self {
            config,
            service,
        })
    }
}

/// Stand-in for commands that only administer the queue
struct DisabledTransport;

#[async_trait]
impl MailTransport for DisabledTransport {
    async fn send(&self, _mail: &OutgoingMail) -> Result<(), EmailError> {
        Err(EmailError::Configuration("SMTP is not configured".to_string()))
    }
}
