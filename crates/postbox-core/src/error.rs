//! Common error types used across all Postbox services

use thiserror::Error;

/// Errors raised while bootstrapping a service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ServiceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
