//! Core utilities and types shared across all Postbox crates

pub mod config;
pub mod encryption;
pub mod error;
pub mod fingerprint;
pub mod types;

// Re-export commonly used types
pub use config::*;
pub use encryption::{build_cipher, AesCbcCipher, AesGcmCipher, Cipher, CipherError, CipherMode};
pub use error::*;
pub use fingerprint::{Fingerprint, XxHash64Fingerprint};
pub use types::*;

// Re-export external dependencies
pub use anyhow;
pub use chrono;
pub use serde;
pub use thiserror;
pub use tracing;
pub use uuid;
