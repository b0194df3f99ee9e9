use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle of a queued job.
///
/// `pending` and `pending_retry` jobs wait to be claimed and become `running`.
/// A running job ends `completed`, goes back to `pending_retry` after a
/// transient failure, or ends `failed` once it runs out of retries. A job
/// stuck in `running` is put back to `pending` by the supervisor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "job_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Waiting for `next_execution_at`
    #[sea_orm(string_value = "pending_retry")]
    PendingRetry,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl JobStatus {
    /// Statuses a worker may claim.
    pub const READY: [Self; 2] = [Self::Pending, Self::PendingRetry];

    /// Statuses removed by retention cleanup.
    pub const FINISHED: [Self; 2] = [Self::Completed, Self::Failed];
}
