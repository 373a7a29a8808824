use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create outbox table
        manager
            .create_table(
                Table::create()
                    .table(Outbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Outbox::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Outbox::Destination).string().not_null())
                    .col(ColumnDef::new(Outbox::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Outbox::Status)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Outbox::Application).string().not_null())
                    .col(ColumnDef::new(Outbox::MediaRef).string())
                    .col(
                        ColumnDef::new(Outbox::InsertedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Outbox::SentAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Outbox::FromIdentity).string())
                    .col(ColumnDef::new(Outbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        // Index covering the claim scan: pending rows per application, oldest first
        manager
            .create_index(
                Index::create()
                    .name("idx_outbox_status_application_inserted_at")
                    .table(Outbox::Table)
                    .col(Outbox::Status)
                    .col(Outbox::Application)
                    .col(Outbox::InsertedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Outbox::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Outbox {
    Table,
    Id,
    Destination,
    Payload,
    Status,
    Application,
    MediaRef,
    InsertedAt,
    SentAt,
    FromIdentity,
    LastError,
}
