use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkerConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkerConfigs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkerConfigs::OwnerId).string().not_null())
                    .col(ColumnDef::new(WorkerConfigs::Name).string().not_null())
                    .col(
                        ColumnDef::new(WorkerConfigs::RoutingGroup)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkerConfigs::ApplicationFilter)
                            .string()
                            .not_null()
                            .default("*"),
                    )
                    .col(
                        ColumnDef::new(WorkerConfigs::MessageKind)
                            .string()
                            .not_null()
                            .default("direct"),
                    )
                    .col(
                        ColumnDef::new(WorkerConfigs::IntervalSeconds)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(ColumnDef::new(WorkerConfigs::IntervalMaxSeconds).integer())
                    .col(
                        ColumnDef::new(WorkerConfigs::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(WorkerConfigs::AllowMedia)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WorkerConfigs::WebhookUrl).string())
                    .col(ColumnDef::new(WorkerConfigs::WebhookSecret).string())
                    .col(
                        ColumnDef::new(WorkerConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_worker_configs_enabled")
                    .table(WorkerConfigs::Table)
                    .col(WorkerConfigs::Enabled)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkerConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WorkerConfigs {
    Table,
    Id,
    OwnerId,
    Name,
    RoutingGroup,
    ApplicationFilter,
    MessageKind,
    IntervalSeconds,
    IntervalMaxSeconds,
    Enabled,
    AllowMedia,
    WebhookUrl,
    WebhookSecret,
    UpdatedAt,
}
