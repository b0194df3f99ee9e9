use sea_orm::DatabaseConnection;

use crate::{
    config::Config,
    environment::Environment,
    job_queue::{JobQueue, JobQueueError},
    jobs::Job,
    mailer::Mailer,
};

/// Shared handles passed to HTTP handlers and jobs.
#[derive(Clone, Debug)]
pub struct App {
    pub config: Config,
    pub environment: Environment,
    pub db: DatabaseConnection,
    pub mailer: Mailer,
    pub job_queue: JobQueue,
}

impl App {
    pub async fn run_job<J: Job>(&self, arguments: &J::Arguments) -> Result<(), JobQueueError>
    where
        J::Arguments: serde::Serialize,
    {
        self.job_queue.add::<J>(&self.db, arguments).await
    }
}
