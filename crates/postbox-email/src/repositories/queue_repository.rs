//! Queue repository.
//!
//! Receivers, CC lists and parameter values are stored encrypted; every read
//! path here hands back plaintext.

use chrono::Utc;
use postbox_core::{Cipher, DBDateTime};
use postbox_entities::{attachments, email_attachments, email_parameters, emails};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::EmailError;
use crate::repositories::{Attachment, TemplateRepository};

const CC_SEPARATOR: char = ';';

/// Plaintext request to persist.
#[derive(Debug, Clone, Default)]
pub struct NewQueuedEmail {
    pub receiver: String,
    pub cc_receivers: Vec<String>,
    pub template_name: String,
    pub attachment_ids: Vec<Uuid>,
    pub parameters: BTreeMap<String, String>,
}

/// Where a queued email is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryState {
    pub fn of(model: &emails::Model) -> Self {
        match (model.is_processed, model.is_delivery_successful) {
            (false, _) => DeliveryState::Pending,
            (true, Some(true)) => DeliveryState::Delivered,
            (true, _) => DeliveryState::Failed,
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryState::Pending => write!(f, "pending"),
            DeliveryState::Delivered => write!(f, "delivered"),
            DeliveryState::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal result recorded by [`QueueRepository::mark_processed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

/// Decrypted view of a queued email.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedEmail {
    pub id: Uuid,
    pub template_id: Uuid,
    pub receiver: String,
    pub cc_receivers: Vec<String>,
    pub created_on: DBDateTime,
    pub sent_on: Option<DBDateTime>,
    pub state: DeliveryState,
    pub delivery_message: Option<String>,
}

/// Email counts by delivery state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmailStats {
    pub total: u64,
    pub pending: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Repository for durable email requests.
#[derive(Clone)]
pub struct QueueRepository {
    db: Arc<DatabaseConnection>,
    cipher: Arc<dyn Cipher>,
}

impl QueueRepository {
    pub fn new(db: Arc<DatabaseConnection>, cipher: Arc<dyn Cipher>) -> Self {
        Self { db, cipher }
    }

    /// Persist an email with its parameters and attachment links in one transaction.
    pub async fn add(&self, email: NewQueuedEmail) -> Result<Uuid, EmailError> {
        let receiver = self
            .cipher
            .encrypt_text(Some(email.receiver.trim()))?
            .ok_or_else(|| EmailError::Validation("Receiver is required".to_string()))?;

        let cc_joined = email
            .cc_receivers
            .iter()
            .map(|cc| cc.trim())
            .filter(|cc| !cc.is_empty())
            .collect::<Vec<_>>()
            .join(&CC_SEPARATOR.to_string());
        let cc_receivers = self.cipher.encrypt_text(Some(&cc_joined))?;

        let mut parameters = Vec::with_capacity(email.parameters.len());
        for (name, value) in &email.parameters {
            parameters.push((name.clone(), self.cipher.encrypt_text(Some(value))?));
        }

        let template_name = email.template_name;
        let attachment_ids = email.attachment_ids;

        let id = self
            .db
            .transaction::<_, Uuid, EmailError>(move |txn| {
                Box::pin(async move {
                    let template_id = TemplateRepository::find_id_by_name(txn, &template_name)
                        .await?
                        .ok_or_else(|| EmailError::TemplateNotFound(template_name.clone()))?;

                    let id = Uuid::new_v4();
                    emails::ActiveModel {
                        id: Set(id),
                        template_id: Set(template_id),
                        receiver: Set(receiver),
                        cc_receivers: Set(cc_receivers),
                        is_processed: Set(false),
                        created_on: Set(Utc::now()),
                        sent_on: Set(None),
                        is_delivery_successful: Set(None),
                        delivery_message: Set(None),
                    }
                    .insert(txn)
                    .await?;

                    for (param_name, param_content) in parameters {
                        email_parameters::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            email_id: Set(id),
                            param_name: Set(param_name),
                            param_content: Set(param_content),
                        }
                        .insert(txn)
                        .await?;
                    }

                    for attachment_id in attachment_ids {
                        email_attachments::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            email_id: Set(id),
                            attachment_id: Set(attachment_id),
                        }
                        .insert(txn)
                        .await?;
                    }

                    Ok(id)
                })
            })
            .await?;

        debug!("Persisted queued email {}", id);
        Ok(id)
    }

    /// Ids of unprocessed emails, oldest first.
    ///
    /// FIFO only holds to the resolution of `created_on`; emails created in the
    /// same instant come back in id order, which is stable but not arrival order.
    pub async fn pending_ids(&self) -> Result<Vec<Uuid>, EmailError> {
        let ids = emails::Entity::find()
            .select_only()
            .column(emails::Column::Id)
            .filter(emails::Column::IsProcessed.eq(false))
            .order_by_asc(emails::Column::CreatedOn)
            .order_by_asc(emails::Column::Id)
            .into_tuple::<Uuid>()
            .all(self.db.as_ref())
            .await?;
        Ok(ids)
    }

    /// Raw row, still encrypted.
    pub async fn get(&self, id: Uuid) -> Result<emails::Model, EmailError> {
        emails::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(EmailError::EmailNotFound(id))
    }

    /// Decrypt a row into its plaintext view.
    pub fn decrypt(&self, model: emails::Model) -> Result<QueuedEmail, EmailError> {
        let state = DeliveryState::of(&model);
        let receiver = self
            .cipher
            .decrypt_text(Some(&model.receiver))?
            .unwrap_or_default();
        let cc_receivers = self
            .cipher
            .decrypt_text(model.cc_receivers.as_deref())?
            .map(|joined| split_cc(&joined))
            .unwrap_or_default();

        Ok(QueuedEmail {
            id: model.id,
            template_id: model.template_id,
            receiver,
            cc_receivers,
            created_on: model.created_on,
            sent_on: model.sent_on,
            state,
            delivery_message: model.delivery_message,
        })
    }

    /// Unprocessed emails decrypted, in the same order as [`Self::pending_ids`].
    pub async fn list_pending(&self) -> Result<Vec<QueuedEmail>, EmailError> {
        let models = emails::Entity::find()
            .filter(emails::Column::IsProcessed.eq(false))
            .order_by_asc(emails::Column::CreatedOn)
            .order_by_asc(emails::Column::Id)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(|m| self.decrypt(m)).collect()
    }

    /// Decrypted parameters of an email. Absent values become empty strings.
    pub async fn parameters(&self, email_id: Uuid) -> Result<BTreeMap<String, String>, EmailError> {
        let rows = email_parameters::Entity::find()
            .filter(email_parameters::Column::EmailId.eq(email_id))
            .order_by_asc(email_parameters::Column::ParamName)
            .all(self.db.as_ref())
            .await?;

        let mut parameters = BTreeMap::new();
        for row in rows {
            let value = self
                .cipher
                .decrypt_text(row.param_content.as_deref())?
                .unwrap_or_default();
            parameters.insert(row.param_name, value);
        }
        Ok(parameters)
    }

    /// Decrypted attachments linked to an email.
    pub async fn attachments(&self, email_id: Uuid) -> Result<Vec<Attachment>, EmailError> {
        let models = attachments::Entity::find()
            .join(
                sea_orm::JoinType::InnerJoin,
                attachments::Relation::EmailAttachments.def(),
            )
            .filter(email_attachments::Column::EmailId.eq(email_id))
            .order_by_asc(attachments::Column::FileName)
            .all(self.db.as_ref())
            .await?;

        models
            .into_iter()
            .map(|m| Attachment::decrypt(m, self.cipher.as_ref()))
            .collect()
    }

    /// Record the terminal outcome of a delivery attempt.
    ///
    /// Only rows that are still pending are touched; returns whether a row changed.
    pub async fn mark_processed(
        &self,
        id: Uuid,
        outcome: DeliveryOutcome,
    ) -> Result<bool, EmailError> {
        let (successful, message) = match outcome {
            DeliveryOutcome::Delivered => (true, None),
            DeliveryOutcome::Failed(message) => (false, Some(message)),
        };

        let result = emails::Entity::update_many()
            .col_expr(emails::Column::IsProcessed, Expr::value(true))
            .col_expr(emails::Column::SentOn, Expr::value(Some(Utc::now())))
            .col_expr(
                emails::Column::IsDeliverySuccessful,
                Expr::value(Some(successful)),
            )
            .col_expr(emails::Column::DeliveryMessage, Expr::value(message))
            .filter(emails::Column::Id.eq(id))
            .filter(emails::Column::IsProcessed.eq(false))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Count emails by delivery state.
    ///
    /// Each state is counted on its own, with the same rules as
    /// [`DeliveryState::of`]; `total` is their sum.
    pub async fn stats(&self) -> Result<EmailStats, EmailError> {
        let db = self.db.as_ref();

        let pending = emails::Entity::find()
            .filter(emails::Column::IsProcessed.eq(false))
            .count(db)
            .await?;
        let delivered = emails::Entity::find()
            .filter(emails::Column::IsProcessed.eq(true))
            .filter(emails::Column::IsDeliverySuccessful.eq(true))
            .count(db)
            .await?;
        let failed = emails::Entity::find()
            .filter(emails::Column::IsProcessed.eq(true))
            .filter(
                Condition::any()
                    .add(emails::Column::IsDeliverySuccessful.eq(false))
                    .add(emails::Column::IsDeliverySuccessful.is_null()),
            )
            .count(db)
            .await?;

        Ok(EmailStats {
            total: pending + delivered + failed,
            pending,
            delivered,
            failed,
        })
    }
}

fn split_cc(joined: &str) -> Vec<String> {
    joined
        .split(CC_SEPARATOR)
        .map(str::trim)
        .filter(|cc| !cc.is_empty())
        .map(String::from)
        .collect()
}
