use std::future::Future;
use std::pin::Pin;
use std::{collections::HashMap, sync::Arc};

use tracing::warn;

use crate::app::App;

use super::{job_result::JobResult, Job, JobError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type JobExecutor =
    Arc<dyn Fn(&App, serde_json::Value) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;
type FailureHandler =
    Arc<dyn Fn(&App, serde_json::Value, JobError) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
struct RegisteredJob {
    executor: JobExecutor,
    on_failure: FailureHandler,
}

/// Maps job type names stored in the `job` table to their implementations.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, RegisteredJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_job<J: Job + 'static>(mut self) -> Self {
        self.register_job::<J>();
        self
    }

    pub fn register_job<J: Job + 'static>(&mut self) {
        let executor: JobExecutor = Arc::new(|app: &App, args_json: serde_json::Value| {
            let app = app.clone();
            Box::pin(async move {
                let arguments = parse_arguments::<J>(args_json)?;
                J::execute(&app, arguments).await
            })
        });

        let on_failure: FailureHandler =
            Arc::new(|app: &App, args_json: serde_json::Value, error: JobError| {
                let app = app.clone();
                Box::pin(async move {
                    match parse_arguments::<J>(args_json) {
                        Ok(arguments) => J::on_failure(&app, arguments, &error).await,
                        Err(e) => warn!("Skipping failure hook for {}: {}", J::name(), e),
                    }
                })
            });

        self.jobs.insert(
            J::name(),
            RegisteredJob {
                executor,
                on_failure,
            },
        );
    }

    pub(crate) fn job_names(&self) -> impl Iterator<Item = &&'static str> {
        self.jobs.keys()
    }

    pub(crate) async fn execute(
        &self,
        app: &App,
        r#type: &str,
        arguments: &serde_json::Value,
    ) -> JobResult {
        let Some(job) = self.jobs.get(r#type) else {
            return JobResult::Failed(JobError::FailPermanently(format!(
                "No job registered for job type: {type}"
            )));
        };

        match (job.executor)(app, arguments.clone()).await {
            Ok(()) => JobResult::Completed,
            Err(e) => JobResult::Failed(e),
        }
    }

    /// Runs the failure hook of a job that will not be attempted again.
    pub(crate) async fn handle_failure(
        &self,
        app: &App,
        r#type: &str,
        arguments: &serde_json::Value,
        error: JobError,
    ) {
        if let Some(job) = self.jobs.get(r#type) {
            (job.on_failure)(app, arguments.clone(), error).await;
        }
    }
}

fn parse_arguments<J: Job>(args_json: serde_json::Value) -> Result<J::Arguments, JobError> {
    serde_json::from_value(args_json)
        .map_err(|e| JobError::FailPermanently(format!("Failed to parse job arguments: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::tests::setup_test::setup_test;

    static FAILURES_SEEN: AtomicUsize = AtomicUsize::new(0);

    #[derive(Deserialize)]
    struct EchoArguments {
        fail: bool,
    }

    struct EchoJob;

    impl Job for EchoJob {
        type Arguments = EchoArguments;

        async fn execute(_app: &App, arguments: Self::Arguments) -> Result<(), JobError> {
            if arguments.fail {
                Err(JobError::FailPermanently("asked to fail".to_string()))
            } else {
                Ok(())
            }
        }

        async fn on_failure(_app: &App, _arguments: Self::Arguments, _error: &JobError) {
            FAILURES_SEEN.fetch_add(1, Ordering::SeqCst);
        }

        fn name() -> &'static str {
            "echo"
        }
    }

    #[tokio::test]
    async fn executes_registered_jobs_by_name() {
        let test = setup_test().await;
        let registry = JobRegistry::new().with_job::<EchoJob>();

        let ok = registry
            .execute(&test.app, "echo", &serde_json::json!({ "fail": false }))
            .await;
        assert!(matches!(ok, JobResult::Completed));

        let failed = registry
            .execute(&test.app, "echo", &serde_json::json!({ "fail": true }))
            .await;
        assert!(matches!(
            failed,
            JobResult::Failed(JobError::FailPermanently(_))
        ));
    }

    #[tokio::test]
    async fn unknown_types_and_bad_arguments_fail_permanently() {
        let test = setup_test().await;
        let registry = JobRegistry::new().with_job::<EchoJob>();

        let unknown = registry
            .execute(&test.app, "missing", &serde_json::json!({}))
            .await;
        assert!(matches!(
            unknown,
            JobResult::Failed(JobError::FailPermanently(_))
        ));

        let malformed = registry
            .execute(&test.app, "echo", &serde_json::json!({ "fail": "nope" }))
            .await;
        assert!(matches!(
            malformed,
            JobResult::Failed(JobError::FailPermanently(_))
        ));
    }

    #[tokio::test]
    async fn failure_hook_runs_with_parsed_arguments() {
        let test = setup_test().await;
        let registry = JobRegistry::new().with_job::<EchoJob>();
        let before = FAILURES_SEEN.load(Ordering::SeqCst);

        registry
            .handle_failure(
                &test.app,
                "echo",
                &serde_json::json!({ "fail": true }),
                JobError::FailPermanently("asked to fail".to_string()),
            )
            .await;

        assert_eq!(FAILURES_SEEN.load(Ordering::SeqCst), before + 1);
    }
}
