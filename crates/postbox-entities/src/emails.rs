//! Queued emails entity
//!
//! `receiver` and `cc_receivers` hold base64 ciphertext, never plain addresses.

use async_trait::async_trait;
use postbox_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "emails")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub template_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub receiver: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub cc_receivers: Option<String>,
    pub is_processed: bool,
    pub created_on: DBDateTime,
    pub sent_on: Option<DBDateTime>,
    pub is_delivery_successful: Option<bool>,
    #[sea_orm(column_type = "Text", nullable)]
    pub delivery_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_templates::Entity",
        from = "Column::TemplateId",
        to = "super::email_templates::Column::Id",
        on_delete = "Cascade"
    )]
    EmailTemplate,
    #[sea_orm(has_many = "super::email_parameters::Entity")]
    EmailParameters,
    #[sea_orm(has_many = "super::email_attachments::Entity")]
    EmailAttachments,
}

impl Related<super::email_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailTemplate.def()
    }
}

impl Related<super::email_parameters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailParameters.def()
    }
}

impl Related<super::email_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailAttachments.def()
    }
}

impl Related<super::attachments::Entity> for Entity {
    fn to() -> RelationDef {
        super::email_attachments::Relation::Attachment.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::email_attachments::Relation::Email.def().rev())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if self.created_on.is_not_set() {
                self.created_on = Set(chrono::Utc::now());
            }
            if self.is_processed.is_not_set() {
                self.is_processed = Set(false);
            }
        }

        Ok(self)
    }
}
