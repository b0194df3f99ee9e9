//! `SeaORM` Entity for job attempts
//!
//! Every attempt gets a row, including the ones a stuck job recovery closes
//! as timed out.

use crate::database::models::job_result::JobResult;
use sea_orm::{entity::prelude::*, Set};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job_execution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub result: JobResult,
    pub started_at: DateTime,
    pub finished_at: DateTime,
    pub execution_time_ms: i64,
    pub failure_reason: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id",
        on_delete = "Cascade"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// A finished attempt of `job_id` that ran from `started_at` to `finished_at`.
    #[must_use]
    pub fn finished(
        job_id: Uuid,
        result: JobResult,
        started_at: DateTime,
        finished_at: DateTime,
        failure_reason: Option<String>,
    ) -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            job_id: Set(job_id),
            result: Set(result),
            started_at: Set(started_at),
            finished_at: Set(finished_at),
            execution_time_ms: Set((finished_at - started_at).num_milliseconds().max(0)),
            failure_reason: Set(failure_reason),
            created_at: Set(finished_at),
        }
    }
}
