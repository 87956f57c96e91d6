//! Mail transport trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EmailError;

/// A decrypted attachment ready to be put on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAttachment {
    pub file_name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// Fully rendered message handed to a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    /// Recipient address
    pub receiver: String,
    /// Carbon-copy recipients
    pub cc_receivers: Vec<String>,
    pub subject: String,
    /// HTML body
    pub html_body: String,
    pub attachments: Vec<MailAttachment>,
}

/// Capability to deliver one rendered message
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send a message; an error means the message was not accepted
    async fn send(&self, mail: &OutgoingMail) -> Result<(), EmailError>;
}
