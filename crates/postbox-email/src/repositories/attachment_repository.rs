//! Content-addressed attachment repository.
//!
//! Rows are keyed externally by the fingerprint of their plaintext. Content is
//! encrypted at rest. Nothing here prevents two rows with the same fingerprint;
//! lookups tolerate duplicates and deletes remove all of them.

use postbox_core::Cipher;
use postbox_entities::attachments;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::EmailError;

const MAX_FILE_NAME_LENGTH: usize = 200;

/// Trimmed file name, or a validation error if it is blank or too long.
pub(crate) fn validate_file_name(file_name: &str) -> Result<&str, EmailError> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(EmailError::Validation(
            "Attachment file name is required".to_string(),
        ));
    }
    if file_name.chars().count() > MAX_FILE_NAME_LENGTH {
        return Err(EmailError::Validation(format!(
            "Attachment file name must be at most {} characters",
            MAX_FILE_NAME_LENGTH
        )));
    }
    Ok(file_name)
}

/// A stored attachment with its content decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub content: Vec<u8>,
    pub original_hash: String,
}

impl Attachment {
    pub(crate) fn decrypt(model: attachments::Model, cipher: &dyn Cipher) -> Result<Self, EmailError> {
        let content = cipher.decrypt_bytes(&model.content)?.unwrap_or_default();
        Ok(Self {
            id: model.id,
            file_name: model.file_name,
            content,
            original_hash: model.original_hash,
        })
    }
}

/// Attachment metadata without content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct AttachmentInfo {
    pub id: Uuid,
    pub file_name: String,
    pub original_hash: String,
}

/// Repository for encrypted, fingerprint-addressed attachments.
#[derive(Clone)]
pub struct AttachmentRepository {
    db: Arc<DatabaseConnection>,
    cipher: Arc<dyn Cipher>,
}

impl AttachmentRepository {
    pub fn new(db: Arc<DatabaseConnection>, cipher: Arc<dyn Cipher>) -> Self {
        Self { db, cipher }
    }

    /// Id of a row carrying `hash`, if any. Among duplicates the smallest id wins.
    pub async fn get_id_by_hash(&self, hash: &str) -> Result<Option<Uuid>, EmailError> {
        let id = attachments::Entity::find()
            .select_only()
            .column(attachments::Column::Id)
            .filter(attachments::Column::OriginalHash.eq(hash))
            .order_by_asc(attachments::Column::Id)
            .into_tuple::<Uuid>()
            .one(self.db.as_ref())
            .await?;
        Ok(id)
    }

    /// Store `content` encrypted under a fresh id.
    pub async fn add(
        &self,
        file_name: &str,
        content: &[u8],
        hash: &str,
    ) -> Result<Uuid, EmailError> {
        let file_name = validate_file_name(file_name)?;
        if hash.trim().is_empty() {
            return Err(EmailError::Validation(
                "Attachment fingerprint is required".to_string(),
            ));
        }

        let encrypted = self
            .cipher
            .encrypt_bytes(content)?
            .ok_or_else(|| EmailError::Validation("Attachment content is empty".to_string()))?;

        let id = Uuid::new_v4();
        let attachment = attachments::ActiveModel {
            id: Set(id),
            file_name: Set(file_name.to_string()),
            content: Set(encrypted),
            original_hash: Set(hash.to_string()),
        };
        attachment.insert(self.db.as_ref()).await?;

        info!("Stored attachment '{}' ({} bytes) as {}", file_name, content.len(), hash);
        Ok(id)
    }

    /// Fetch and decrypt the attachment carrying `hash`, same row as [`Self::get_id_by_hash`].
    pub async fn get_by_hash(&self, hash: &str) -> Result<Option<Attachment>, EmailError> {
        let model = attachments::Entity::find()
            .filter(attachments::Column::OriginalHash.eq(hash))
            .order_by_asc(attachments::Column::Id)
            .one(self.db.as_ref())
            .await?;

        model
            .map(|m| Attachment::decrypt(m, self.cipher.as_ref()))
            .transpose()
    }

    /// List all attachments by file name. Content is not read.
    pub async fn list_all(&self) -> Result<Vec<AttachmentInfo>, EmailError> {
        let infos = attachments::Entity::find()
            .select_only()
            .column(attachments::Column::Id)
            .column(attachments::Column::FileName)
            .column(attachments::Column::OriginalHash)
            .order_by_asc(attachments::Column::FileName)
            .into_model::<AttachmentInfo>()
            .all(self.db.as_ref())
            .await?;
        Ok(infos)
    }

    /// Delete every row carrying `hash`. Returns the number of rows removed.
    pub async fn delete_by_hash(&self, hash: &str) -> Result<u64, EmailError> {
        let result = attachments::Entity::delete_many()
            .filter(attachments::Column::OriginalHash.eq(hash))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            info!("Deleted {} attachment row(s) for {}", result.rows_affected, hash);
        } else {
            debug!("No attachment stored for {}", hash);
        }
        Ok(result.rows_affected)
    }

    /// Map each stored fingerprint in `hashes` to its smallest row id. Unknown hashes are absent.
    pub async fn resolve_many(&self, hashes: &[String]) -> Result<HashMap<String, Uuid>, EmailError> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = attachments::Entity::find()
            .select_only()
            .column(attachments::Column::Id)
            .column(attachments::Column::OriginalHash)
            .filter(attachments::Column::OriginalHash.is_in(hashes.iter().cloned()))
            .order_by_asc(attachments::Column::Id)
            .into_tuple::<(Uuid, String)>()
            .all(self.db.as_ref())
            .await?;

        let mut resolved = HashMap::with_capacity(rows.len());
        for (id, hash) in rows {
            resolved.entry(hash).or_insert(id);
        }
        Ok(resolved)
    }
}
