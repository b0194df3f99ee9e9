use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use std::{str::FromStr, time::Duration};
use tokio::{
    task::JoinSet,
    time::{sleep, sleep_until, Instant},
};
use tracing::{debug, error, info};

use crate::{
    database::models::{job, job_status::JobStatus},
    jobs::scheduled_job::ScheduledJob,
};

/// Runs every scheduled entry in its own task, inserting a job each time its
/// cron expression fires.
pub struct Scheduler {
    db: DatabaseConnection,
    schedule: Vec<ScheduledJob>,
}

impl Scheduler {
    pub const fn new(db: DatabaseConnection, schedule: Vec<ScheduledJob>) -> Self {
        Self { db, schedule }
    }

    pub async fn run(self) {
        info!(
            "📅 Scheduler started with {} scheduled jobs",
            self.schedule.len()
        );

        if self.schedule.is_empty() {
            debug!("📅 No scheduled jobs configured, scheduler will idle");
            std::future::pending::<()>().await;
            return;
        }

        let mut tasks = JoinSet::new();
        for scheduled_job in self.schedule {
            let Some(schedule) = parse_cron_schedule(&scheduled_job) else {
                continue;
            };

            debug!("📅 Spawned scheduler task for '{}'", scheduled_job.name);
            tasks.spawn(run_scheduled_job(scheduled_job, schedule, self.db.clone()));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("📅 Scheduler task failed: {}", e);
            }
        }
    }
}

fn parse_cron_schedule(scheduled_job: &ScheduledJob) -> Option<cron::Schedule> {
    cron::Schedule::from_str(&scheduled_job.cron_expression)
        .inspect_err(|e| {
            error!(
                "❌ Invalid cron expression '{}' for '{}': {}",
                scheduled_job.cron_expression, scheduled_job.name, e
            );
        })
        .ok()
}

async fn run_scheduled_job(
    scheduled_job: ScheduledJob,
    schedule: cron::Schedule,
    db: DatabaseConnection,
) {
    loop {
        let Some(next_execution) = schedule.upcoming(Utc).next() else {
            error!(
                "❌ Could not determine next execution time for '{}'",
                scheduled_job.name
            );
            sleep(Duration::from_secs(60)).await;
            continue;
        };

        debug!(
            "🔄 '{}' next execution at: {}",
            scheduled_job.name,
            next_execution.format("%Y-%m-%d %H:%M:%S UTC")
        );

        wait_until(next_execution).await;

        match insert_job(&scheduled_job, &db).await {
            Ok(()) => info!("📅 Enqueued scheduled job '{}'", scheduled_job.name),
            Err(e) => error!(
                "❌ Failed to enqueue scheduled job '{}': {}",
                scheduled_job.name, e
            ),
        }
    }
}

async fn wait_until(next_execution: DateTime<Utc>) {
    let sleep_duration = (next_execution - Utc::now()).to_std().unwrap_or_default();
    if sleep_duration > Duration::ZERO {
        sleep_until(Instant::now() + sleep_duration).await;
    }
}

async fn insert_job(scheduled_job: &ScheduledJob, db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();

    job::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        r#type: Set(scheduled_job.job_name.to_string()),
        arguments: Set(scheduled_job.arguments.clone()),
        status: Set(JobStatus::Pending),
        retry_count: Set(0),
        next_execution_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(())
}
