//! Error types for the email service

use postbox_core::CipherError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template already exists: {0}")]
    TemplateAlreadyExists(String),

    #[error("Email not found: {0}")]
    EmailNotFound(Uuid),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<sea_orm::TransactionError<EmailError>> for EmailError {
    fn from(err: sea_orm::TransactionError<EmailError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => EmailError::Database(e),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}

impl From<lettre::error::Error> for EmailError {
    fn from(err: lettre::error::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}

impl From<lettre::address::AddressError> for EmailError {
    fn from(err: lettre::address::AddressError) -> Self {
        EmailError::Transport(format!("Invalid address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}
