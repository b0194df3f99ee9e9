use sea_orm_migration::{
    prelude::*,
    schema::{integer_null, json_binary, string, string_len, text_null, timestamp, uuid, uuid_null},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationLog::Table)
                    .if_not_exists()
                    .col(
                        uuid(NotificationLog::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(uuid_null(NotificationLog::CustomerId))
                    .col(string(NotificationLog::Recipient))
                    .col(string_len(NotificationLog::Channel, 16).default("email"))
                    .col(string(NotificationLog::Template))
                    .col(uuid_null(NotificationLog::OrderId))
                    .col(integer_null(NotificationLog::ReminderCycle))
                    .col(string_len(NotificationLog::Status, 16))
                    .col(text_null(NotificationLog::Error))
                    .col(json_binary(NotificationLog::Metadata).default(Expr::cust("'{}'::jsonb")))
                    .col(
                        timestamp(NotificationLog::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .to_owned(),
            )
            .await?;

        // Duplicate check lookup; not unique, a manual dispatch may log the same pair twice
        manager
            .create_index(
                Index::create()
                    .name("idx-notification_log-order_id-template")
                    .table(NotificationLog::Table)
                    .col(NotificationLog::OrderId)
                    .col(NotificationLog::Template)
                    .col(NotificationLog::ReminderCycle)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-notification_log-created_at")
                    .table(NotificationLog::Table)
                    .col(NotificationLog::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationLog {
    Table,
    Id,
    CustomerId,
    Recipient,
    Channel,
    Template,
    OrderId,
    ReminderCycle,
    Status,
    Error,
    Metadata,
    CreatedAt,
}
