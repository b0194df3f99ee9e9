use serde_json::json;

use crate::{config::RemindersConfig, notifications::reminders::ReminderCheck};

/// A periodic entry of the scheduler: inserts one `job_name` job every time
/// `cron_expression` fires.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub job_name: &'static str,
    pub arguments: serde_json::Value,
    pub cron_expression: String,
}

impl ScheduledJob {
    pub fn new(
        name: impl Into<String>,
        job_name: &'static str,
        arguments: serde_json::Value,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            job_name,
            arguments,
            cron_expression: cron_expression.into(),
        }
    }
}

/// The daily pickup, return and overdue checks.
#[must_use]
pub fn reminder_schedule(config: &RemindersConfig) -> Vec<ScheduledJob> {
    [
        (ReminderCheck::Pickup, &config.pickup_check_cron),
        (ReminderCheck::Return, &config.return_check_cron),
        (ReminderCheck::Overdue, &config.overdue_check_cron),
    ]
    .into_iter()
    .map(|(check, cron_expression)| {
        ScheduledJob::new(
            format!("{check}_check"),
            "reminder_check",
            json!({ "check": check }),
            cron_expression.as_str(),
        )
    })
    .collect()
}
