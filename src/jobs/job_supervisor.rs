use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder as _, QuerySelect as _, Set,
};
use std::{collections::HashSet, time::Duration};
use thiserror::Error;
use tokio::{spawn, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    app::App,
    config::{CleanupConfig, JobsConfig, WorkerQueueConfig, WorkersConfig},
    database::models::{
        job::{self, Entity as JobEntity},
        job_execution,
        job_result::JobResult as ExecutionResult,
        job_status::JobStatus,
    },
    jobs::{
        advisory_lock::{self, lock_keys},
        job_result::JobResult,
        retry_delay,
        scheduler::Scheduler,
        worker::worker,
    },
};

use super::{job_registry::JobRegistry, scheduled_job::ScheduledJob};

const RECOVERY_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobSupervisorError {
    #[error("no worker pool handles job type '{0}'")]
    UncoveredJobType(String),
}

/// Every registered job type needs a pool, otherwise its jobs sit in the
/// queue forever.
pub fn verify_job_types_have_workers(
    workers_config: &WorkersConfig,
    job_registry: &JobRegistry,
) -> Result<(), JobSupervisorError> {
    let covered: HashSet<&str> = workers_config
        .workers
        .values()
        .flat_map(|pool| pool.jobs.iter().map(String::as_str))
        .collect();

    let mut uncovered: Vec<&str> = job_registry
        .job_names()
        .copied()
        .filter(|name| !covered.contains(name))
        .collect();
    uncovered.sort_unstable();

    match uncovered.first() {
        Some(name) => Err(JobSupervisorError::UncoveredJobType((*name).to_string())),
        None => Ok(()),
    }
}

/// Starts worker pools, the scheduler, stuck job recovery and cleanup, then
/// parks forever.
pub async fn job_supervisor(
    jobs_config: JobsConfig,
    app: App,
    job_registry: JobRegistry,
    job_schedule: Vec<ScheduledJob>,
) -> Result<(), JobSupervisorError> {
    verify_job_types_have_workers(&jobs_config.workers, &job_registry)?;

    start_worker_pools(&jobs_config.workers, &app, &job_registry);
    start_scheduler(&app.db, job_schedule);
    start_recovery_task(&jobs_config.workers, &app, &job_registry);
    start_cleanup_task(&jobs_config.cleanup, &app.db);

    std::future::pending::<()>().await;
    Ok(())
}

fn start_worker_pools(config: &WorkersConfig, app: &App, job_registry: &JobRegistry) {
    info!("🚀 Starting job workers");

    for (pool_name, pool_config) in &config.workers {
        info!(
            "⚡ Pool '{}': {} workers for jobs {:?}",
            pool_name, pool_config.count, pool_config.jobs
        );

        for worker_id in 0..pool_config.count {
            let worker_instance_name = format!("{pool_name}-{worker_id}");
            let pool_config = pool_config.clone();
            let app = app.clone();
            let job_registry = job_registry.clone();

            spawn(async move {
                run_worker_with_restart(&worker_instance_name, &pool_config, app, job_registry)
                    .await;
            });
        }
    }
}

async fn run_worker_with_restart(
    worker_instance_name: &str,
    worker_config: &WorkerQueueConfig,
    app: App,
    job_registry: JobRegistry,
) {
    for restart_count in 0_u64.. {
        debug!(
            "Starting worker '{}' for job types: {:?} (restart #{})",
            worker_instance_name, worker_config.jobs, restart_count
        );

        if let Err(e) = worker(
            worker_instance_name,
            worker_config,
            app.clone(),
            &job_registry,
        )
        .await
        {
            error!(
                "💥 Worker '{}' crashed (restart #{}): {}",
                worker_instance_name, restart_count, e
            );
        }

        sleep(Duration::from_secs(10)).await;
    }
}

fn start_scheduler(db: &DatabaseConnection, job_schedule: Vec<ScheduledJob>) {
    let db = db.clone();

    spawn(async move {
        advisory_lock::run_with_advisory_lock(db, lock_keys::SCHEDULER, "scheduler", move |db| {
            let schedule = job_schedule.clone();
            async move {
                info!("📅 Starting job scheduler");
                Scheduler::new(db, schedule).run().await;
            }
        })
        .await;
    });
}

fn start_recovery_task(config: &WorkersConfig, app: &App, job_registry: &JobRegistry) {
    let config = config.clone();
    let app = app.clone();
    let job_registry = job_registry.clone();

    spawn(async move {
        advisory_lock::run_with_advisory_lock(
            app.db.clone(),
            lock_keys::RECOVERY,
            "stuck job recovery",
            move |db| {
                let config = config.clone();
                let app = App { db, ..app.clone() };
                let job_registry = job_registry.clone();
                async move {
                    info!("🏥 Starting stuck job recovery");
                    run_recovery_loop(&config, &app, &job_registry).await;
                }
            },
        )
        .await;
    });
}

async fn run_recovery_loop(config: &WorkersConfig, app: &App, job_registry: &JobRegistry) {
    loop {
        match recover_stuck_jobs(config, app, job_registry).await {
            Ok(0) => {}
            Ok(recovered) => info!("🏥 Recovered {} stuck jobs", recovered),
            Err(e) => {
                error!("❌ Failed to recover stuck jobs: {}", e);
                return;
            }
        }

        sleep(RECOVERY_INTERVAL).await;
    }
}

/// What happens to a job found stuck in `running`.
#[derive(Debug, PartialEq, Eq)]
enum StuckJobAction {
    Retry {
        retry_count: i32,
        delay: chrono::Duration,
    },
    Fail,
}

/// A stuck attempt counts as a timed out one, so it uses up a retry like
/// any other.
fn stuck_job_action(retry_count: i32, pool_config: &WorkerQueueConfig) -> StuckJobAction {
    match retry_delay(&JobResult::TimedOut, retry_count, pool_config) {
        Some(delay) => StuckJobAction::Retry {
            retry_count: retry_count.saturating_add(1),
            delay,
        },
        None => StuckJobAction::Fail,
    }
}

/// Closes jobs that have been `running` for more than twice their pool's
/// timeout as timed out attempts, then retries or fails them.
async fn recover_stuck_jobs(
    config: &WorkersConfig,
    app: &App,
    job_registry: &JobRegistry,
) -> Result<usize, DbErr> {
    let mut total_recovered = 0;

    for (pool_name, pool_config) in &config.workers {
        let threshold_seconds = pool_config.job_timeout.saturating_mul(2);
        let cutoff = chrono::Utc::now().naive_utc()
            - chrono::Duration::seconds(threshold_seconds.into());

        let stuck_jobs = JobEntity::find()
            .filter(job::Column::Status.eq(JobStatus::Running))
            .filter(job::Column::Type.is_in(&pool_config.jobs))
            .filter(job::Column::UpdatedAt.lte(cutoff))
            .all(&app.db)
            .await?;

        for stuck_job in stuck_jobs {
            recover_stuck_job(stuck_job, pool_name, pool_config, app, job_registry).await?;
            total_recovered += 1;
        }
    }

    Ok(total_recovered)
}

async fn recover_stuck_job(
    stuck_job: job::Model,
    pool_name: &str,
    pool_config: &WorkerQueueConfig,
    app: &App,
    job_registry: &JobRegistry,
) -> Result<(), DbErr> {
    let now = chrono::Utc::now().naive_utc();
    let running_for = now.signed_duration_since(stuck_job.updated_at);

    warn!(
        "🏥 Recovering stuck job {}({}) in pool '{}' on attempt {}, running for {}s",
        stuck_job.r#type,
        stuck_job.id,
        pool_name,
        stuck_job.attempt(),
        running_for.num_seconds(),
    );

    job_execution::ActiveModel::finished(
        stuck_job.id,
        ExecutionResult::TimedOut,
        stuck_job.updated_at,
        now,
        Some(format!(
            "Recovered after running for {}s",
            running_for.num_seconds()
        )),
    )
    .insert(&app.db)
    .await?;

    let mut active_job: job::ActiveModel = stuck_job.clone().into();
    match stuck_job_action(stuck_job.retry_count, pool_config) {
        StuckJobAction::Retry { retry_count, delay } => {
            active_job.status = Set(JobStatus::PendingRetry);
            active_job.retry_count = Set(retry_count);
            active_job.next_execution_at = Set(Some(now + delay));
            active_job.update(&app.db).await?;
        }
        StuckJobAction::Fail => {
            error!(
                "❌ Stuck job {}({}) has no retries left, marking it failed",
                stuck_job.r#type, stuck_job.id
            );
            active_job.status = Set(JobStatus::Failed);
            active_job.update(&app.db).await?;

            if let Some(error) = JobResult::TimedOut.into_error() {
                job_registry
                    .handle_failure(app, &stuck_job.r#type, &stuck_job.arguments, error)
                    .await;
            }
        }
    }

    Ok(())
}

fn start_cleanup_task(config: &CleanupConfig, db: &DatabaseConnection) {
    let config = config.clone();
    let db = db.clone();

    spawn(async move {
        advisory_lock::run_with_advisory_lock(db, lock_keys::CLEANUP, "job cleanup", move |db| {
            let config = config.clone();
            async move {
                info!("🧹 Starting job cleanup task");
                loop {
                    if let Err(e) = cleanup_old_jobs(&config, &db).await {
                        error!("🧹 Failed to clean up old jobs: {}", e);
                    }
                    sleep(Duration::from_secs(config.interval_seconds)).await;
                }
            }
        })
        .await;
    });
}

fn retention_cutoff(retention_seconds: u64) -> chrono::NaiveDateTime {
    let retention = i64::try_from(retention_seconds).unwrap_or(i64::MAX / 1000);
    chrono::Utc::now().naive_utc() - chrono::Duration::seconds(retention)
}

const fn retention_seconds(config: &CleanupConfig, status: JobStatus) -> u64 {
    match status {
        JobStatus::Failed => config.failed_retention_seconds,
        _ => config.completed_retention_seconds,
    }
}

/// Deletes finished jobs past their retention period. Executions go with
/// them through the foreign key cascade.
async fn cleanup_old_jobs(config: &CleanupConfig, db: &DatabaseConnection) -> Result<(), DbErr> {
    for status in JobStatus::FINISHED {
        let cutoff = retention_cutoff(retention_seconds(config, status));
        let deleted = delete_jobs_older_than(db, status, cutoff, config.batch_size).await?;

        if deleted > 0 {
            info!("🧹 Deleted {} {} jobs", deleted, status);
        }
    }
    Ok(())
}

async fn delete_jobs_older_than(
    db: &DatabaseConnection,
    status: JobStatus,
    cutoff: chrono::NaiveDateTime,
    batch_size: usize,
) -> Result<u64, DbErr> {
    let mut deleted = 0;

    loop {
        let job_ids: Vec<uuid::Uuid> = JobEntity::find()
            .select_only()
            .column(job::Column::Id)
            .filter(job::Column::Status.eq(status))
            .filter(job::Column::CreatedAt.lte(cutoff))
            .order_by_asc(job::Column::CreatedAt)
            .limit(batch_size as u64)
            .into_tuple()
            .all(db)
            .await?;

        if job_ids.is_empty() {
            return Ok(deleted);
        }

        let result = JobEntity::delete_many()
            .filter(job::Column::Id.is_in(job_ids))
            .exec(db)
            .await?;
        deleted += result.rows_affected;

        debug!("🧹 Deleted batch of {} {} jobs", result.rows_affected, status);
        sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::notifications::{dispatch::DispatchNotificationJob, reminders::ReminderCheckJob};

    fn pool(jobs: &[&str]) -> WorkerQueueConfig {
        WorkerQueueConfig {
            jobs: jobs.iter().map(ToString::to_string).collect(),
            count: 1,
            job_timeout: 120,
            max_retries: 3,
            base_retry_delay_seconds: 60,
            retry_backoff_multiplier: 1,
        }
    }

    fn registry() -> JobRegistry {
        JobRegistry::new()
            .with_job::<DispatchNotificationJob>()
            .with_job::<ReminderCheckJob>()
    }

    #[test]
    fn accepts_configuration_covering_every_job() {
        let workers = WorkersConfig {
            workers: HashMap::from([
                ("notifications".to_string(), pool(&["dispatch_notification"])),
                ("reminders".to_string(), pool(&["reminder_check"])),
            ]),
        };

        assert_eq!(verify_job_types_have_workers(&workers, &registry()), Ok(()));
    }

    #[test]
    fn stuck_jobs_use_up_a_retry() {
        let config = pool(&["dispatch_notification"]);

        assert_eq!(
            stuck_job_action(0, &config),
            StuckJobAction::Retry {
                retry_count: 1,
                delay: chrono::Duration::seconds(60),
            }
        );
        assert_eq!(
            stuck_job_action(2, &config),
            StuckJobAction::Retry {
                retry_count: 3,
                delay: chrono::Duration::seconds(60),
            }
        );
    }

    #[test]
    fn a_job_that_keeps_getting_stuck_ends_failed() {
        let config = pool(&["dispatch_notification"]);

        let mut retry_count = 0;
        let mut recoveries = 0;
        while let StuckJobAction::Retry {
            retry_count: next, ..
        } = stuck_job_action(retry_count, &config)
        {
            retry_count = next;
            recoveries += 1;
        }

        assert_eq!(recoveries, 3);
        assert_eq!(stuck_job_action(retry_count, &config), StuckJobAction::Fail);
    }

    #[test]
    fn failed_jobs_are_kept_longer() {
        let config = CleanupConfig::default();

        assert_eq!(retention_seconds(&config, JobStatus::Completed), 86_400);
        assert_eq!(retention_seconds(&config, JobStatus::Failed), 1_209_600);
    }

    #[test]
    fn reports_job_types_without_a_pool() {
        let workers = WorkersConfig {
            workers: HashMap::from([(
                "notifications".to_string(),
                pool(&["dispatch_notification"]),
            )]),
        };

        assert_eq!(
            verify_job_types_have_workers(&workers, &registry()),
            Err(JobSupervisorError::UncoveredJobType(
                "reminder_check".to_string()
            ))
        );
    }
}
