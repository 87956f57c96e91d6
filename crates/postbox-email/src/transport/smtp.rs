//! SMTP delivery through lettre

use async_trait::async_trait;
use lettre::{
    message::{
        header::ContentType, Attachment, Mailbox, MessageBuilder, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters, TlsParametersBuilder},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::EmailError;
use crate::transport::{MailTransport, OutgoingMail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    None,     // No encryption
    #[default]
    Starttls, // Upgrade a plain connection
    Tls,      // Direct TLS connection
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMode::None => write!(f, "none"),
            TlsMode::Starttls => write!(f, "starttls"),
            TlsMode::Tls => write!(f, "tls"),
        }
    }
}

impl std::str::FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "plain" => Ok(TlsMode::None),
            "starttls" => Ok(TlsMode::Starttls),
            "tls" | "smtps" => Ok(TlsMode::Tls),
            other => Err(format!(
                "unknown TLS mode '{}', expected none, starttls or tls",
                other
            )),
        }
    }
}

fn default_port() -> u16 {
    587
}

fn default_starttls_required() -> bool {
    true
}

/// Connection settings for the outbound SMTP relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Address used in the `From` header
    pub sender: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub tls_mode: TlsMode,
    #[serde(default = "default_starttls_required")]
    pub starttls_required: bool, // Only used when tls_mode is Starttls
    #[serde(default)]
    pub accept_invalid_certs: bool, // Accept self-signed certificates (use with caution)
}

impl SmtpSettings {
    pub fn new(host: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: None,
            password: None,
            sender: sender.into(),
            sender_name: None,
            tls_mode: TlsMode::default(),
            starttls_required: default_starttls_required(),
            accept_invalid_certs: false,
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        }
    }

    fn tls_parameters(&self) -> Result<TlsParameters, EmailError> {
        let relaxed = self.accept_invalid_certs
            || self.host == "localhost"
            || self.host == "127.0.0.1";

        Ok(TlsParametersBuilder::new(self.host.clone())
            .dangerous_accept_invalid_certs(relaxed)
            .dangerous_accept_invalid_hostnames(relaxed)
            .build()?)
    }
}

/// [`MailTransport`] backed by an async lettre SMTP pool
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailTransport {
    pub fn new(settings: &SmtpSettings) -> Result<Self, EmailError> {
        if settings.host.trim().is_empty() {
            return Err(EmailError::Configuration("SMTP host is empty".to_string()));
        }

        let sender = Mailbox::new(settings.sender_name.clone(), settings.sender.parse()?);

        let mailer = match settings.tls_mode {
            TlsMode::None => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                        .port(settings.port);
                if let Some(creds) = settings.credentials() {
                    builder = builder.credentials(creds);
                }
                builder.build()
            }
            TlsMode::Starttls => {
                let tls = settings.tls_parameters()?;
                let tls = if settings.starttls_required {
                    Tls::Required(tls)
                } else {
                    Tls::Opportunistic(tls)
                };
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                        .port(settings.port)
                        .tls(tls);
                if let Some(creds) = settings.credentials() {
                    builder = builder.credentials(creds);
                }
                builder.build()
            }
            TlsMode::Tls => {
                let tls = settings.tls_parameters()?;
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
                    .port(settings.port)
                    .tls(Tls::Wrapper(tls));
                if let Some(creds) = settings.credentials() {
                    builder = builder.credentials(creds);
                }
                builder.build()
            }
        };

        debug!(
            "SMTP transport configured for {}:{} ({})",
            settings.host, settings.port, settings.tls_mode
        );

        Ok(Self { mailer, sender })
    }

    /// Check that the relay accepts connections
    pub async fn test_connection(&self) -> Result<bool, EmailError> {
        Ok(self.mailer.test_connection().await?)
    }
}

/// Builds the MIME message for `mail` with `sender` in the `From` header
pub(crate) fn build_message(sender: &Mailbox, mail: &OutgoingMail) -> Result<Message, EmailError> {
    let mut builder: MessageBuilder = Message::builder()
        .from(sender.clone())
        .to(mail.receiver.parse::<Mailbox>()?)
        .subject(mail.subject.clone());

    for cc in &mail.cc_receivers {
        builder = builder.cc(cc.parse::<Mailbox>()?);
    }

    let html = SinglePart::html(mail.html_body.clone());

    if mail.attachments.is_empty() {
        return Ok(builder.singlepart(html)?);
    }

    let mut parts = MultiPart::mixed().singlepart(html);
    for attachment in &mail.attachments {
        let mime = mime_guess::from_path(&attachment.file_name).first_or_octet_stream();
        let content_type = ContentType::parse(mime.essence_str()).map_err(|e| {
            EmailError::Transport(format!(
                "Invalid content type for '{}': {}",
                attachment.file_name, e
            ))
        })?;
        parts = parts.singlepart(
            Attachment::new(attachment.file_name.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    Ok(builder.multipart(parts)?)
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), EmailError> {
        let message = build_message(&self.sender, mail)?;
        self.mailer.send(message).await?;
        Ok(())
    }
}
