mod advisory_lock;
pub mod job_registry;
pub mod job_result;
pub mod job_supervisor;
pub mod scheduled_job;
mod scheduler;
mod worker;

pub(crate) use worker::retry_delay;

use crate::app::App;
use serde::de::DeserializeOwned;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("{0}")]
    FailPermanently(String),
    #[error("{0}")]
    TryAgainLater(String),
}

/// A unit of background work stored in the `job` table.
pub trait Job: Send + Sync {
    type Arguments: DeserializeOwned + Send + Sync;

    fn execute(
        app: &App,
        arguments: Self::Arguments,
    ) -> impl Future<Output = Result<(), JobError>> + Send;

    /// Called once the job has reached its terminal `failed` state: after a
    /// permanent failure, or after the last retry.
    fn on_failure(
        _app: &App,
        _arguments: Self::Arguments,
        _error: &JobError,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    fn name() -> &'static str;
}
