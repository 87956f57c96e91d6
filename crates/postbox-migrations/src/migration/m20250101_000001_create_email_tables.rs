use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // EMAIL_TEMPLATES TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailTemplates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailTemplates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailTemplates::Name)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(EmailTemplates::Subject)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailTemplates::Content).text().not_null())
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAILS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Emails::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Emails::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Emails::TemplateId).uuid().not_null())
                    .col(ColumnDef::new(Emails::Receiver).text().not_null())
                    .col(ColumnDef::new(Emails::CcReceivers).text().null())
                    .col(
                        ColumnDef::new(Emails::IsProcessed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Emails::CreatedOn)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Emails::SentOn)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Emails::IsDeliverySuccessful).boolean().null())
                    .col(ColumnDef::new(Emails::DeliveryMessage).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emails_template")
                            .from(Emails::Table, Emails::TemplateId)
                            .to(EmailTemplates::Table, EmailTemplates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Pending sweep filters on is_processed
        manager
            .create_index(
                Index::create()
                    .name("idx_emails_is_processed")
                    .table(Emails::Table)
                    .col(Emails::IsProcessed)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emails_template_id")
                    .table(Emails::Table)
                    .col(Emails::TemplateId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL_PARAMETERS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailParameters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailParameters::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailParameters::EmailId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmailParameters::ParamName)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailParameters::ParamContent).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_parameters_email")
                            .from(EmailParameters::Table, EmailParameters::EmailId)
                            .to(Emails::Table, Emails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_parameters_email_id")
                    .table(EmailParameters::Table)
                    .col(EmailParameters::EmailId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // ATTACHMENTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Attachments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attachments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Attachments::FileName)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attachments::Content).binary().not_null())
                    .col(
                        ColumnDef::new(Attachments::OriginalHash)
                            .string_len(200)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Not unique: concurrent uploads of the same file may both insert
        manager
            .create_index(
                Index::create()
                    .name("idx_attachments_original_hash")
                    .table(Attachments::Table)
                    .col(Attachments::OriginalHash)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL_ATTACHMENTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailAttachments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailAttachments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailAttachments::EmailId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmailAttachments::AttachmentId)
                            .uuid()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_attachments_email")
                            .from(EmailAttachments::Table, EmailAttachments::EmailId)
                            .to(Emails::Table, Emails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_attachments_attachment")
                            .from(EmailAttachments::Table, EmailAttachments::AttachmentId)
                            .to(Attachments::Table, Attachments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_attachments_email_id")
                    .table(EmailAttachments::Table)
                    .col(EmailAttachments::EmailId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Children first; indexes go with their tables
        manager
            .drop_table(Table::drop().table(EmailAttachments::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Attachments::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailParameters::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Emails::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailTemplates::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailTemplates {
    Table,
    Id,
    Name,
    Subject,
    Content,
}

#[derive(DeriveIden)]
enum Emails {
    Table,
    Id,
    TemplateId,
    Receiver,
    CcReceivers,
    IsProcessed,
    CreatedOn,
    SentOn,
    IsDeliverySuccessful,
    DeliveryMessage,
}

#[derive(DeriveIden)]
enum EmailParameters {
    Table,
    Id,
    EmailId,
    ParamName,
    ParamContent,
}

#[derive(DeriveIden)]
enum Attachments {
    Table,
    Id,
    FileName,
    Content,
    OriginalHash,
}

#[derive(DeriveIden)]
enum EmailAttachments {
    Table,
    Id,
    EmailId,
    AttachmentId,
}
