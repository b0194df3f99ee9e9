use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use lettre::message::Mailbox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub database: DatabaseConfig,
    pub jobs: JobsConfig,
    pub server: ServerConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailConfig {
    /// Mock mailer that captures emails for testing
    Mock {
        #[serde(
            default = "default_mock_sender",
            deserialize_with = "deserialize_mailbox"
        )]
        sender: Mailbox,
    },
    /// Real SMTP configuration for sending emails
    Smtp {
        host: String,
        port: u16,
        #[serde(deserialize_with = "deserialize_mailbox")]
        sender: Mailbox,
        username: Option<String>,
        password: Option<String>,
        #[serde(default = "default_use_tls")]
        use_tls: bool,
    },
}

impl EmailConfig {
    /// Address notifications are sent from.
    #[must_use]
    pub const fn sender(&self) -> &Mailbox {
        match self {
            Self::Mock { sender } | Self::Smtp { sender, .. } => sender,
        }
    }
}

fn deserialize_mailbox<'de, D>(deserializer: D) -> Result<Mailbox, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn default_mock_sender() -> Mailbox {
    "Rentdesk <noreply@rentdesk.test>"
        .parse()
        .expect("Invalid default sender")
}

const fn default_use_tls() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

/// Periodic reminder checks and overdue policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Cron expression (with seconds) for the pickup reminder check
    #[serde(default = "default_pickup_cron")]
    pub pickup_check_cron: String,
    /// Cron expression (with seconds) for the return reminder check
    #[serde(default = "default_return_cron")]
    pub return_check_cron: String,
    /// Cron expression (with seconds) for the overdue check
    #[serde(default = "default_overdue_cron")]
    pub overdue_check_cron: String,
    /// Late fee charged per day overdue
    #[serde(default = "default_daily_late_fee")]
    pub daily_late_fee: i64,
    /// Overdue notices go out on every n-th day overdue
    #[serde(default = "default_overdue_notice_interval")]
    pub overdue_notice_interval_days: i64,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            pickup_check_cron: default_pickup_cron(),
            return_check_cron: default_return_cron(),
            overdue_check_cron: default_overdue_cron(),
            daily_late_fee: default_daily_late_fee(),
            overdue_notice_interval_days: default_overdue_notice_interval(),
        }
    }
}

fn default_pickup_cron() -> String {
    "0 0 9 * * *".to_string()
}

fn default_return_cron() -> String {
    "0 30 9 * * *".to_string()
}

fn default_overdue_cron() -> String {
    "0 0 10 * * *".to_string()
}

const fn default_daily_late_fee() -> i64 {
    100
}

const fn default_overdue_notice_interval() -> i64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub cleanup: CleanupConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Interval between cleanup runs in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
    /// Retention period for completed jobs in seconds (default: 86400 = 1 day)
    #[serde(default = "default_completed_retention")]
    pub completed_retention_seconds: u64,
    /// Retention period for failed jobs in seconds (default: 1209600 = 14 days)
    #[serde(default = "default_failed_retention")]
    pub failed_retention_seconds: u64,
    /// Maximum number of jobs to delete in a single batch (default: 1000)
    #[serde(default = "default_cleanup_batch_size")]
    pub batch_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_cleanup_interval(),
            completed_retention_seconds: default_completed_retention(),
            failed_retention_seconds: default_failed_retention(),
            batch_size: default_cleanup_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkersConfig {
    #[serde(flatten)]
    pub workers: HashMap<String, WorkerQueueConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueueConfig {
    pub jobs: Vec<String>,
    pub count: u32,
    /// Job execution timeout in seconds (default: 120)
    #[serde(default = "default_job_timeout")]
    pub job_timeout: u32,
    /// Number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Delay in seconds before the first retry (default: 60)
    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_seconds: u64,
    /// Backoff multiplier applied per retry; 1 keeps the delay fixed (default: 1)
    #[serde(default = "default_retry_multiplier")]
    pub retry_backoff_multiplier: u64,
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_job_timeout() -> u32 {
    120
}

const fn default_base_retry_delay() -> u64 {
    60
}

const fn default_retry_multiplier() -> u64 {
    1
}

const fn default_cleanup_interval() -> u64 {
    3600
}

const fn default_completed_retention() -> u64 {
    86_400
}

const fn default_failed_retention() -> u64 {
    1_209_600
}

const fn default_cleanup_batch_size() -> usize {
    1000
}
