use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per lease name, inserted by whoever holds it
        manager
            .create_table(
                Table::create()
                    .table(SweepLeases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SweepLeases::Name)
                            .string_len(50)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SweepLeases::Holder).uuid().not_null())
                    .col(
                        ColumnDef::new(SweepLeases::AcquiredOn)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SweepLeases::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SweepLeases {
    Table,
    Name,
    Holder,
    AcquiredOn,
}
