//! Attachments entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub file_name: String,
    /// Encrypted file bytes
    #[serde(skip)]
    pub content: Vec<u8>,
    /// Fingerprint of the plaintext content
    pub original_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_attachments::Entity")]
    EmailAttachments,
}

impl Related<super::email_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailAttachments.def()
    }
}

impl Related<super::emails::Entity> for Entity {
    fn to() -> RelationDef {
        super::email_attachments::Relation::Email.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::email_attachments::Relation::Attachment.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
