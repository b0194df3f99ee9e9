use std::process;

use chrono::{NaiveDate, Utc};

use crate::{
    app::App,
    config::Config,
    database::setup_database_connection,
    environment::Environment,
    job_queue::JobQueue,
    mailer::Mailer,
    notifications::reminders::{run_check, ReminderCheck},
};

/// Runs one reminder check right away. Notifications are enqueued in the
/// `job` table for the workers of a running server to send.
pub async fn handle_reminders_run_command(
    environment: Environment,
    config: Config,
    check: ReminderCheck,
    date: Option<NaiveDate>,
) {
    let today = date.unwrap_or_else(|| Utc::now().date_naive());

    let db = match setup_database_connection(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ Could not connect to the database: {e}");
            process::exit(1);
        }
    };

    let app = App {
        mailer: Mailer::mock(),
        config,
        environment,
        db,
        job_queue: JobQueue::database(),
    };

    match run_check(&app, check, today).await {
        Ok(enqueued) => println!("🔔 {check} check for {today}: {enqueued} notification(s) enqueued"),
        Err(e) => {
            eprintln!("❌ {check} check failed: {e}");
            process::exit(1);
        }
    }
}
