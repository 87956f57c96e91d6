//! Template repository.

use postbox_core::PaginationParams;
use postbox_entities::email_templates;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::EmailError;

const MAX_NAME_LENGTH: usize = 50;
const MAX_SUBJECT_LENGTH: usize = 200;

/// Fields supplied when creating or replacing a template.
#[derive(Debug, Clone)]
pub struct TemplateInput {
    pub name: String,
    pub subject: String,
    pub content: String,
}

impl TemplateInput {
    fn validate(&self) -> Result<(), EmailError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(EmailError::Validation(
                "Template name is required".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(EmailError::Validation(format!(
                "Template name must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
        if self.subject.trim().is_empty() {
            return Err(EmailError::Validation(
                "Template subject is required".to_string(),
            ));
        }
        if self.subject.chars().count() > MAX_SUBJECT_LENGTH {
            return Err(EmailError::Validation(format!(
                "Template subject must be at most {} characters",
                MAX_SUBJECT_LENGTH
            )));
        }
        if self.content.trim().is_empty() {
            return Err(EmailError::Validation(
                "Template content is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Repository for named subject/body templates.
#[derive(Clone)]
pub struct TemplateRepository {
    db: Arc<DatabaseConnection>,
}

impl TemplateRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Look up a template id by name on any connection, including an open transaction.
    pub async fn find_id_by_name<C>(conn: &C, name: &str) -> Result<Option<Uuid>, EmailError>
    where
        C: ConnectionTrait,
    {
        let id = email_templates::Entity::find()
            .select_only()
            .column(email_templates::Column::Id)
            .filter(email_templates::Column::Name.eq(name))
            .into_tuple::<Uuid>()
            .one(conn)
            .await?;
        Ok(id)
    }

    /// Get a template by its unique name.
    pub async fn get_by_name(&self, name: &str) -> Result<email_templates::Model, EmailError> {
        email_templates::Entity::find()
            .filter(email_templates::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EmailError::TemplateNotFound(name.to_string()))
    }

    /// Get a template by id.
    pub async fn get(&self, id: Uuid) -> Result<email_templates::Model, EmailError> {
        email_templates::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EmailError::TemplateNotFound(id.to_string()))
    }

    /// List templates ordered by name, returning one page and the total count.
    pub async fn list(
        &self,
        params: PaginationParams,
    ) -> Result<(Vec<email_templates::Model>, u64), EmailError> {
        let (page, page_size) = params.normalize();

        let paginator = email_templates::Entity::find()
            .order_by_asc(email_templates::Column::Name)
            .paginate(self.db.as_ref(), page_size);

        let total = paginator.num_items().await?;
        let templates = paginator.fetch_page(page - 1).await?;

        Ok((templates, total))
    }

    /// Create a template. Names are unique.
    pub async fn add(&self, input: TemplateInput) -> Result<email_templates::Model, EmailError> {
        input.validate()?;
        let name = input.name.trim().to_string();

        if Self::find_id_by_name(self.db.as_ref(), &name).await?.is_some() {
            return Err(EmailError::TemplateAlreadyExists(name));
        }

        let template = email_templates::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            subject: Set(input.subject),
            content: Set(input.content),
        };

        let model = template.insert(self.db.as_ref()).await?;
        info!("Created email template '{}' ({})", model.name, model.id);
        Ok(model)
    }

    /// Replace name, subject and content of an existing template.
    pub async fn update(
        &self,
        id: Uuid,
        input: TemplateInput,
    ) -> Result<email_templates::Model, EmailError> {
        input.validate()?;
        let existing = self.get(id).await?;
        let name = input.name.trim().to_string();

        if name != existing.name {
            if let Some(other) = Self::find_id_by_name(self.db.as_ref(), &name).await? {
                if other != id {
                    return Err(EmailError::TemplateAlreadyExists(name));
                }
            }
        }

        let mut active_model: email_templates::ActiveModel = existing.into();
        active_model.name = Set(name);
        active_model.subject = Set(input.subject);
        active_model.content = Set(input.content);

        let model = active_model.update(self.db.as_ref()).await?;
        debug!("Updated email template '{}'", model.name);
        Ok(model)
    }

    /// Delete a template. Emails queued against it are removed with it.
    pub async fn delete(&self, id: Uuid) -> Result<(), EmailError> {
        let result = email_templates::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(EmailError::TemplateNotFound(id.to_string()));
        }

        info!("Deleted email template {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_database::test_utils::TestDatabase;

    fn input(name: &str) -> TemplateInput {
        TemplateInput {
            name: name.to_string(),
            subject: "Hi ${name}".to_string(),
            content: "Welcome ${name}!".to_string(),
        }
    }

    async fn setup() -> (TestDatabase, TemplateRepository) {
        let db = TestDatabase::with_migrations().await.unwrap();
        let repository = TemplateRepository::new(db.db.clone());
        (db, repository)
    }

    #[tokio::test]
    async fn test_add_and_get_by_name() {
        let (_db, repository) = setup().await;

        let created = repository.add(input("Welcome")).await.unwrap();
        let found = repository.get_by_name("Welcome").await.unwrap();

        assert_eq!(created.id, found.id);
        assert_eq!(found.subject, "Hi ${name}");
        assert_eq!(found.content, "Welcome ${name}!");
    }

    #[tokio::test]
    async fn test_get_by_name_unknown_template() {
        let (_db, repository) = setup().await;

        let result = repository.get_by_name("Missing").await;
        assert!(matches!(result, Err(EmailError::TemplateNotFound(name)) if name == "Missing"));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let (_db, repository) = setup().await;

        repository.add(input("Welcome")).await.unwrap();
        let result = repository.add(input("Welcome")).await;
        assert!(matches!(result, Err(EmailError::TemplateAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_validation_limits() {
        let (_db, repository) = setup().await;

        let long_name = "n".repeat(51);
        assert!(matches!(
            repository.add(input(&long_name)).await,
            Err(EmailError::Validation(_))
        ));

        let mut long_subject = input("Subject");
        long_subject.subject = "s".repeat(201);
        assert!(matches!(
            repository.add(long_subject).await,
            Err(EmailError::Validation(_))
        ));

        let mut empty_body = input("Body");
        empty_body.content = "  ".to_string();
        assert!(matches!(
            repository.add(empty_body).await,
            Err(EmailError::Validation(_))
        ));

        // Exactly at the limits is fine
        let mut at_limit = input(&"n".repeat(50));
        at_limit.subject = "s".repeat(200);
        assert!(repository.add(at_limit).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_and_rename_conflict() {
        let (_db, repository) = setup().await;

        let welcome = repository.add(input("Welcome")).await.unwrap();
        repository.add(input("Goodbye")).await.unwrap();

        let mut changed = input("Welcome");
        changed.subject = "Hello ${name}".to_string();
        let updated = repository.update(welcome.id, changed).await.unwrap();
        assert_eq!(updated.subject, "Hello ${name}");

        let result = repository.update(welcome.id, input("Goodbye")).await;
        assert!(matches!(result, Err(EmailError::TemplateAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_list_is_paginated() {
        let (_db, repository) = setup().await;

        for name in ["c", "a", "b"] {
            repository.add(input(name)).await.unwrap();
        }

        let (page, total) = repository
            .list(PaginationParams {
                page: Some(1),
                page_size: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let (page, _) = repository
            .list(PaginationParams {
                page: Some(2),
                page_size: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "c");
    }

    #[tokio::test]
    async fn test_delete() {
        let (_db, repository) = setup().await;

        let template = repository.add(input("Welcome")).await.unwrap();
        repository.delete(template.id).await.unwrap();

        assert!(repository.get_by_name("Welcome").await.is_err());
        assert!(matches!(
            repository.delete(template.id).await,
            Err(EmailError::TemplateNotFound(_))
        ));
    }
}
