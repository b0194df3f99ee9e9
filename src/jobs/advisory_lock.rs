use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Keys of the session-level advisory locks guarding singleton loops.
pub mod lock_keys {
    /// Reminder scheduler ("RDSCHED")
    pub const SCHEDULER: i64 = 0x5244_5343_4845_4400;

    /// Finished job cleanup ("RDCLEAN")
    pub const CLEANUP: i64 = 0x5244_434C_4541_4E00;

    /// Stuck job recovery ("RDRECOV")
    pub const RECOVERY: i64 = 0x5244_5245_434F_5600;
}

const RESTART_DELAY: Duration = Duration::from_secs(10);

async fn call_lock_function(
    db: &DatabaseConnection,
    function: &str,
    key: i64,
) -> Result<bool, DbErr> {
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        format!("SELECT {function}($1)"),
        [key.into()],
    );

    let row = db.query_one(stmt).await?;
    Ok(row
        .and_then(|row| row.try_get_by_index::<bool>(0).ok())
        .unwrap_or(false))
}

pub async fn try_acquire_lock(db: &DatabaseConnection, key: i64) -> Result<bool, DbErr> {
    call_lock_function(db, "pg_try_advisory_lock", key).await
}

pub async fn release_lock(db: &DatabaseConnection, key: i64) -> Result<bool, DbErr> {
    call_lock_function(db, "pg_advisory_unlock", key).await
}

/// Runs `task_fn` on whichever instance holds `lock_key`, restarting it
/// whenever it returns. Instances without the lock poll for it with jitter.
pub async fn run_with_advisory_lock<F, Fut>(
    db: DatabaseConnection,
    lock_key: i64,
    task_name: &str,
    task_fn: F,
) where
    F: Fn(DatabaseConnection) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut restart_count = 0;

    loop {
        match try_acquire_lock(&db, lock_key).await {
            Ok(true) => {
                debug!("🔒 Acquired advisory lock for {}", task_name);

                task_fn(db.clone()).await;

                match release_lock(&db, lock_key).await {
                    Ok(released) => {
                        debug!("🔓 Released advisory lock for {} ({})", task_name, released);
                    }
                    Err(e) => {
                        warn!("Failed to release advisory lock for {}: {}", task_name, e);
                    }
                }

                restart_count += 1;
                error!(
                    "💥 {} stopped (restart #{}), restarting in {}s",
                    task_name,
                    restart_count,
                    RESTART_DELAY.as_secs()
                );
                sleep(RESTART_DELAY).await;
            }
            Ok(false) => {
                debug!(
                    "🔒 Advisory lock for {} held by another instance, waiting",
                    task_name
                );
                sleep(Duration::from_secs(5) + Duration::from_millis(fastrand::u64(0..2000)))
                    .await;
            }
            Err(e) => {
                error!(
                    "❌ Failed to acquire advisory lock for {}: {}",
                    task_name, e
                );
                sleep(RESTART_DELAY).await;
            }
        }
    }
}
