//! Attachment service: fingerprinting and de-duplication on top of the store

use postbox_core::Fingerprint;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::EmailError;
use crate::repositories::{validate_file_name, Attachment, AttachmentInfo, AttachmentRepository};

/// Service for content-addressed attachments
#[derive(Clone)]
pub struct AttachmentService {
    repository: AttachmentRepository,
    fingerprint: Arc<dyn Fingerprint>,
}

impl AttachmentService {
    pub fn new(repository: AttachmentRepository, fingerprint: Arc<dyn Fingerprint>) -> Self {
        Self {
            repository,
            fingerprint,
        }
    }

    /// Store a file unless identical content is already present.
    ///
    /// Returns the fingerprint callers use to reference the file.
    pub async fn add_file(&self, file_name: &str, content: &[u8]) -> Result<String, EmailError> {
        let file_name = validate_file_name(file_name)?;
        if content.is_empty() {
            return Err(EmailError::Validation(
                "Attachment content is empty".to_string(),
            ));
        }

        let hash = self.fingerprint.fingerprint(content);
        if self.repository.get_id_by_hash(&hash).await?.is_some() {
            debug!("Attachment {} already stored, reusing it", hash);
            return Ok(hash);
        }

        self.repository.add(file_name, content, &hash).await?;
        Ok(hash)
    }

    /// Fingerprint of `content` if identical bytes are already stored.
    pub async fn check_if_exists(&self, content: &[u8]) -> Result<Option<String>, EmailError> {
        let hash = self.fingerprint.fingerprint(content);
        let exists = self.repository.get_id_by_hash(&hash).await?.is_some();
        Ok(exists.then_some(hash))
    }

    pub async fn get_file(&self, hash: &str) -> Result<Option<Attachment>, EmailError> {
        self.repository.get_by_hash(hash).await
    }

    pub async fn list_files(&self) -> Result<Vec<AttachmentInfo>, EmailError> {
        self.repository.list_all().await
    }

    pub async fn delete_file(&self, hash: &str) -> Result<u64, EmailError> {
        self.repository.delete_by_hash(hash).await
    }

    pub async fn resolve_ids(&self, hashes: &[String]) -> Result<HashMap<String, Uuid>, EmailError> {
        self.repository.resolve_many(hashes).await
    }
}
