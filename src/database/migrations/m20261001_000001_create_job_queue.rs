use sea_orm::{sea_query::extension::postgres::Type, ActiveEnum, DbBackend, Schema};
use sea_orm_migration::{
    prelude::*,
    schema::{json_binary, string, timestamp, uuid},
};

use crate::database::models::{job_result::JobResult, job_status::JobStatus};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(DbBackend::Postgres);

        manager
            .create_type(schema.create_enum_from_active_enum::<JobStatus>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<JobResult>())
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Job::Table)
                    .if_not_exists()
                    .col(
                        uuid(Job::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(timestamp(Job::CreatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(timestamp(Job::UpdatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(string(Job::Type))
                    .col(json_binary(Job::Arguments))
                    .col(
                        ColumnDef::new(Job::Status)
                            .custom(JobStatus::name())
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Job::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Job::NextExecutionAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        // Workers claim the oldest runnable job of their types
        manager
            .create_index(
                Index::create()
                    .name("idx-job-status-type-created_at")
                    .table(Job::Table)
                    .col(Job::Status)
                    .col(Job::Type)
                    .col(Job::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(JobExecution::Table)
                    .if_not_exists()
                    .col(
                        uuid(JobExecution::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(uuid(JobExecution::JobId))
                    .col(
                        ColumnDef::new(JobExecution::Result)
                            .custom(JobResult::name())
                            .not_null(),
                    )
                    .col(timestamp(JobExecution::StartedAt))
                    .col(timestamp(JobExecution::FinishedAt))
                    .col(
                        ColumnDef::new(JobExecution::ExecutionTimeMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(JobExecution::FailureReason).text().null())
                    .col(
                        timestamp(JobExecution::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-job_execution-job_id")
                            .from(JobExecution::Table, JobExecution::JobId)
                            .to(Job::Table, Job::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-job_execution-job_id")
                    .table(JobExecution::Table)
                    .col(JobExecution::JobId)
                    .to_owned(),
            )
            .await?;

        let connection = manager.get_connection();

        connection
            .execute_unprepared(
                r"
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = CURRENT_TIMESTAMP;
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                CREATE TRIGGER update_job_updated_at
                    BEFORE UPDATE ON job
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                ",
            )
            .await?;

        // Wakes idle workers listening on `job_new`
        connection
            .execute_unprepared(
                r"
                CREATE OR REPLACE FUNCTION notify_job_new()
                RETURNS TRIGGER AS $$
                BEGIN
                    PERFORM pg_notify('job_new', NEW.type);
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                CREATE TRIGGER job_new_notify
                    AFTER INSERT ON job
                    FOR EACH ROW
                    EXECUTE FUNCTION notify_job_new();
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r"
                DROP TRIGGER IF EXISTS job_new_notify ON job;
                DROP FUNCTION IF EXISTS notify_job_new();
                DROP TRIGGER IF EXISTS update_job_updated_at ON job;
                ",
            )
            .await?;

        manager
            .drop_table(Table::drop().table(JobExecution::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(JobResult::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(JobStatus::name()).to_owned())
            .await?;

        // Shared with the rental tables, which are dropped before this migration
        manager
            .get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS update_updated_at_column();")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    Type,
    Arguments,
    Status,
    RetryCount,
    NextExecutionAt,
}

#[derive(DeriveIden)]
enum JobExecution {
    Table,
    Id,
    JobId,
    Result,
    StartedAt,
    FinishedAt,
    ExecutionTimeMs,
    FailureReason,
    CreatedAt,
}
