use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sqlx::postgres::PgListener;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::{
    config::WorkerQueueConfig,
    database::models::{
        job::{self, Entity as JobEntity},
        job_execution,
        job_status::JobStatus,
    },
    jobs::{job_result::JobResult, JobError},
};

use super::job_registry::JobRegistry;

const FALLBACK_POLL_INTERVAL_SECS: u64 = 30;

pub async fn worker(
    worker_instance_name: &str,
    worker_config: &WorkerQueueConfig,
    app: App,
    job_registry: &JobRegistry,
) -> Result<(), DbErr> {
    let mut listener = listen_for_new_jobs(worker_instance_name, &app.db).await;

    loop {
        let mut jobs_processed = 0;
        while let Some(job) = claim_oldest_viable_job(worker_config, &app.db).await? {
            debug!(
                "🔧 Worker '{worker_instance_name}' claimed {} {}({}), attempt {}",
                job.status,
                job.r#type,
                job.id,
                job.attempt(),
            );

            execute_and_update_job(
                &job,
                worker_config,
                &app,
                job_registry,
                worker_instance_name,
            )
            .await?;

            jobs_processed += 1;
        }

        if jobs_processed > 0 {
            debug!(
                "Worker '{}' processed {} job(s), queue drained",
                worker_instance_name, jobs_processed
            );
        }

        let Some(l) = listener.as_mut() else {
            sleep(Duration::from_secs(1)).await;
            continue;
        };

        match timeout(Duration::from_secs(FALLBACK_POLL_INTERVAL_SECS), l.recv()).await {
            Ok(Ok(_notification)) => {
                debug!("Worker '{}' received job notification", worker_instance_name);
            }
            Ok(Err(e)) => {
                error!(
                    "Worker '{}' PgListener error: {}. Switching to polling.",
                    worker_instance_name, e
                );
                listener = None;
                sleep(Duration::from_secs(1)).await;
            }
            Err(_) => {
                debug!(
                    "Worker '{}' polling (no notifications for {}s)",
                    worker_instance_name, FALLBACK_POLL_INTERVAL_SECS
                );
            }
        }
    }
}

/// Subscribes to `job_new`; `None` means the worker falls back to polling.
async fn listen_for_new_jobs(
    worker_instance_name: &str,
    db: &DatabaseConnection,
) -> Option<PgListener> {
    let mut listener = match PgListener::connect_with(db.get_postgres_connection_pool()).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(
                "Worker '{}' failed to create PgListener: {}. Using polling fallback.",
                worker_instance_name, e
            );
            return None;
        }
    };

    if let Err(e) = listener.listen("job_new").await {
        warn!(
            "Worker '{}' failed to LISTEN on 'job_new': {}. Using polling fallback.",
            worker_instance_name, e
        );
        return None;
    }

    info!(
        "Worker '{}' listening for instant job notifications",
        worker_instance_name
    );
    Some(listener)
}

async fn execute_and_update_job(
    job_model: &job::Model,
    worker_config: &WorkerQueueConfig,
    app: &App,
    job_registry: &JobRegistry,
    worker_instance_name: &str,
) -> Result<(), DbErr> {
    let start_time = Instant::now();
    let timeout_duration = Duration::from_secs(u64::from(worker_config.job_timeout));

    let result = timeout(
        timeout_duration,
        job_registry.execute(app, &job_model.r#type, &job_model.arguments),
    )
    .await
    .unwrap_or(JobResult::TimedOut);

    let execution_duration = start_time.elapsed();

    record_execution(job_model, &result, execution_duration, &app.db).await?;

    if matches!(result, JobResult::Completed) {
        info!(
            "✅ Worker '{worker_instance_name}' completed job {}({}) in {:?}",
            job_model.r#type, job_model.id, execution_duration
        );
        return set_status(job_model, JobStatus::Completed, &app.db).await;
    }

    match retry_delay(&result, job_model.retry_count, worker_config) {
        Some(delay) => {
            warn!(
                "⚠️ Worker '{worker_instance_name}' retrying job {}({}) in {}s after {:?}: {}",
                job_model.r#type,
                job_model.id,
                delay.num_seconds(),
                execution_duration,
                result
            );
            let next_execution_at = chrono::Utc::now().naive_utc() + delay;
            schedule_retry(job_model, next_execution_at, &app.db).await
        }
        None => {
            error!(
                "❌ Worker '{worker_instance_name}' failed job {}({}) on attempt {} in {:?}: {}",
                job_model.r#type,
                job_model.id,
                job_model.attempt(),
                execution_duration,
                result
            );
            set_status(job_model, JobStatus::Failed, &app.db).await?;

            if let Some(error) = result.into_error() {
                job_registry
                    .handle_failure(app, &job_model.r#type, &job_model.arguments, error)
                    .await;
            }
            Ok(())
        }
    }
}

/// Delay before the next attempt, or `None` when the job must not run again.
///
/// A job that has already been retried `max_retries` times is finished.
pub(crate) fn retry_delay(
    result: &JobResult,
    retry_count: i32,
    worker_config: &WorkerQueueConfig,
) -> Option<chrono::Duration> {
    let retryable = match result {
        JobResult::Completed | JobResult::Failed(JobError::FailPermanently(_)) => false,
        JobResult::Failed(JobError::TryAgainLater(_)) | JobResult::TimedOut => true,
    };
    if !retryable || retry_count >= worker_config.max_retries {
        return None;
    }

    let exponent = u32::try_from(retry_count).unwrap_or(0);
    let delay_seconds = worker_config.base_retry_delay_seconds.saturating_mul(
        worker_config
            .retry_backoff_multiplier
            .saturating_pow(exponent),
    );

    Some(chrono::Duration::seconds(
        i64::try_from(delay_seconds).unwrap_or(i64::MAX / 1000),
    ))
}

async fn claim_oldest_viable_job(
    worker_config: &WorkerQueueConfig,
    db: &DatabaseConnection,
) -> Result<Option<job::Model>, DbErr> {
    let txn = db.begin().await?;
    let now = chrono::Utc::now().naive_utc();

    let job_option = JobEntity::find()
        .filter(job::Column::Type.is_in(worker_config.jobs.iter()))
        .filter(job::Column::Status.is_in(JobStatus::READY))
        .filter(
            job::Column::NextExecutionAt
                .is_null()
                .or(job::Column::NextExecutionAt.lte(now)),
        )
        .order_by_asc(job::Column::CreatedAt)
        .limit(1)
        .lock_exclusive()
        .one(&txn)
        .await?;

    let Some(job_model) = job_option else {
        txn.commit().await?;
        return Ok(None);
    };

    let mut active_model: job::ActiveModel = job_model.clone().into();
    active_model.status = Set(JobStatus::Running);
    active_model.update(&txn).await?;

    txn.commit().await?;
    Ok(Some(job_model))
}

async fn record_execution(
    job_model: &job::Model,
    result: &JobResult,
    execution_duration: Duration,
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    let finished_at = chrono::Utc::now().naive_utc();
    let started_at = chrono::Duration::from_std(execution_duration)
        .map_or(finished_at, |duration| finished_at - duration);

    job_execution::ActiveModel::finished(
        job_model.id,
        result.into(),
        started_at,
        finished_at,
        result.failure_reason(),
    )
    .insert(db)
    .await?;

    Ok(())
}

async fn set_status(
    job_model: &job::Model,
    status: JobStatus,
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    let mut active_model: job::ActiveModel = job_model.clone().into();
    active_model.status = Set(status);
    active_model.update(db).await?;
    Ok(())
}

async fn schedule_retry(
    job_model: &job::Model,
    next_execution_at: NaiveDateTime,
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    let mut active_model: job::ActiveModel = job_model.clone().into();
    active_model.status = Set(JobStatus::PendingRetry);
    active_model.retry_count = Set(job_model.retry_count + 1);
    active_model.next_execution_at = Set(Some(next_execution_at));
    active_model.update(db).await?;
    Ok(())
}
