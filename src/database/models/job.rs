//! `SeaORM` Entity for the job queue
//!
//! Dispatch and reminder check jobs live here between being enqueued and
//! being cleaned up. Inserting a row fires `NOTIFY job_new`.

use crate::database::models::job_status::JobStatus;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Registered job name, e.g. `dispatch_notification`
    pub r#type: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub arguments: Json,
    pub status: JobStatus,
    /// Retries scheduled so far; the first attempt runs with 0
    pub retry_count: i32,
    /// Earliest time a worker may claim the job; `None` means now
    pub next_execution_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_execution::Entity")]
    JobExecution,
}

impl Related<super::job_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobExecution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// One-based number of the attempt about to run.
    #[must_use]
    pub const fn attempt(&self) -> i32 {
        self.retry_count.saturating_add(1)
    }
}
