use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, NotSet, Set};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    database::models::{job, job_status::JobStatus},
    jobs::Job,
};

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("Failed to serialize job arguments: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to insert job: {0}")]
    Database(#[from] DbErr),
}

/// Where `App::run_job` puts jobs: the `job` table, or an in-memory list in
/// tests.
#[derive(Clone, Debug)]
pub enum JobQueue {
    Database,
    Mock(Arc<Mutex<Vec<EnqueuedJob>>>),
}

/// A job captured by the mock queue.
#[derive(Debug, Clone)]
pub struct EnqueuedJob {
    pub job_type: String,
    pub arguments: serde_json::Value,
}

impl EnqueuedJob {
    /// Decodes the captured arguments back into the job's argument type.
    pub fn arguments_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.arguments.clone())
    }
}

impl JobQueue {
    pub fn mock() -> Self {
        Self::Mock(Arc::new(Mutex::new(Vec::new())))
    }

    pub const fn database() -> Self {
        Self::Database
    }

    pub async fn add<J: Job>(
        &self,
        db: &DatabaseConnection,
        arguments: &J::Arguments,
    ) -> Result<(), JobQueueError>
    where
        J::Arguments: Serialize,
    {
        let arguments = serde_json::to_value(arguments)?;

        match self {
            Self::Database => {
                let job_id = uuid::Uuid::new_v4();

                job::ActiveModel {
                    id: Set(job_id),
                    created_at: NotSet,
                    updated_at: NotSet,
                    r#type: Set(J::name().to_string()),
                    arguments: Set(arguments),
                    status: Set(JobStatus::Pending),
                    retry_count: Set(0),
                    next_execution_at: Set(None),
                }
                .insert(db)
                .await?;

                debug!("Enqueued {}({})", J::name(), job_id);
            }
            Self::Mock(enqueued) => {
                lock(enqueued).push(EnqueuedJob {
                    job_type: J::name().to_string(),
                    arguments,
                });
            }
        }

        Ok(())
    }

    /// Jobs captured so far, `None` for the database queue.
    pub fn enqueued_jobs(&self) -> Option<Vec<EnqueuedJob>> {
        match self {
            Self::Mock(enqueued) => Some(lock(enqueued).clone()),
            Self::Database => None,
        }
    }

    pub fn enqueued_jobs_of_type(&self, job_type: &str) -> Option<Vec<EnqueuedJob>> {
        self.enqueued_jobs().map(|jobs| {
            jobs.into_iter()
                .filter(|job| job.job_type == job_type)
                .collect()
        })
    }

    pub fn clear_enqueued_jobs(&self) {
        if let Self::Mock(enqueued) = self {
            lock(enqueued).clear();
        }
    }
}

fn lock(enqueued: &Mutex<Vec<EnqueuedJob>>) -> MutexGuard<'_, Vec<EnqueuedJob>> {
    enqueued.lock().unwrap_or_else(PoisonError::into_inner)
}
