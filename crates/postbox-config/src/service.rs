use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use postbox_core::config::DatabaseConfig;
use postbox_core::{build_cipher, Cipher, CipherMode};
use postbox_email::SmtpSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

/// Runtime configuration resolved once at startup.
///
/// The binary fills this from command line flags with `POSTBOX_*`
/// environment fallbacks. Only `database_url` is always required; the
/// cipher material is needed by anything that touches stored emails and
/// `smtp` only by commands that actually deliver.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // Required fields
    pub database_url: String,

    // Pool settings
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    // Secrets, never serialized back out
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub encryption_iv: Option<String>,
    #[serde(default)]
    pub cipher_mode: CipherMode,

    #[serde(default)]
    pub smtp: Option<SmtpSettings>,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("database_url", &self.database_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "***"))
            .field("encryption_iv", &self.encryption_iv.as_ref().map(|_| "***"))
            .field("cipher_mode", &self.cipher_mode)
            .field("smtp_host", &self.smtp.as_ref().map(|s| s.host.as_str()))
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

impl ServerConfig {
    /// Create a configuration with defaults for everything but the database
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            db_max_connections: default_max_connections(),
            db_min_connections: default_min_connections(),
            encryption_key: None,
            encryption_iv: None,
            cipher_mode: CipherMode::default(),
            smtp: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }

    pub fn with_encryption(
        mut self,
        mode: CipherMode,
        key: Option<String>,
        iv: Option<String>,
    ) -> Self {
        self.cipher_mode = mode;
        self.encryption_key = key;
        self.encryption_iv = iv;
        self
    }

    pub fn with_smtp(mut self, smtp: SmtpSettings) -> Self {
        self.smtp = Some(smtp);
        self
    }

    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Check the settings that do not need I/O to verify
    pub fn validate(&self) -> anyhow::Result<()> {
        self.database_config()
            .validate()
            .map_err(|e| anyhow!("{}", e))?;

        if self.sweep_interval_secs == 0 {
            bail!("sweep interval must be at least one second");
        }

        if let Some(smtp) = &self.smtp {
            if smtp.host.trim().is_empty() {
                bail!("SMTP host is empty");
            }
            if smtp.sender.trim().is_empty() {
                bail!("SMTP sender address is empty");
            }
            if smtp.port == 0 {
                bail!("SMTP port must be non-zero");
            }
        }

        debug!("Configuration validated: {:?}", self);
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            max_connections: self.db_max_connections,
            min_connections: self.db_min_connections,
        }
    }

    /// Build the configured cipher, failing fast on missing or malformed key material
    pub fn cipher(&self) -> anyhow::Result<Arc<dyn Cipher>> {
        build_cipher(
            self.cipher_mode,
            self.encryption_key.as_deref(),
            self.encryption_iv.as_deref(),
        )
        .with_context(|| format!("failed to initialise {} cipher", self.cipher_mode))
    }

    pub fn smtp_settings(&self) -> anyhow::Result<&SmtpSettings> {
        self.smtp
            .as_ref()
            .ok_or_else(|| anyhow!("SMTP is not configured, set POSTBOX_SMTP_HOST and POSTBOX_SMTP_SENDER"))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
