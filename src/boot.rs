use std::{env, process, str::FromStr as _};

use clap::Parser as _;
use config_rs::{Config as ConfigRs, ConfigError};
use tracing::{debug, trace};

use crate::{
    app_info::AppInfo,
    cli::{Cli, Commands, DbAction, RemindersAction},
    commands::{db, db_reset, migrate, reminders, serve, version},
    config::Config,
    database::migrations::Migrator,
    environment::Environment,
    jobs::{
        job_registry::JobRegistry,
        scheduled_job::{reminder_schedule, ScheduledJob},
    },
    notifications::{DispatchNotificationJob, ReminderCheckJob},
    setup_tracing::setup_tracing_for_command,
};

const ENVIRONMENT_VARIABLE: &str = "APP_ENVIRONMENT";
const CONFIG_ENV_PREFIX: &str = "APP";

/// Every job type the workers know how to run.
#[must_use]
pub fn job_registry() -> JobRegistry {
    JobRegistry::new()
        .with_job::<DispatchNotificationJob>()
        .with_job::<ReminderCheckJob>()
}

#[must_use]
pub fn job_schedule(config: &Config) -> Vec<ScheduledJob> {
    reminder_schedule(&config.reminders)
}

pub async fn boot() {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Version)) {
        version::print_version_info(AppInfo::current(), &job_registry());
        return;
    }

    let environment = environment_from_env();
    let config = match read_config(environment) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration for {environment}: {e}");
            process::exit(1);
        }
    };

    setup_tracing_for_command(cli.command.as_ref(), &config.tracing.log_level);

    debug!("Environment set to: {:?}", environment);
    trace!("Configuration loaded: {:?}", config);

    handle_command(environment, config, cli).await;
}

#[must_use]
pub fn environment_from_env() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// Loads `config/{environment}.toml`, overridden by `APP_*` variables
/// (`APP_DATABASE__URL` sets `database.url`).
pub fn read_config(environment: Environment) -> Result<Config, ConfigError> {
    let config_file = environment.config_file();

    trace!("Reading configuration from: {}", config_file);

    ConfigRs::builder()
        .add_source(config_rs::File::with_name(&config_file))
        .add_source(
            config_rs::Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize()
}

async fn handle_command(environment: Environment, config: Config, cli: Cli) {
    match cli.command {
        Some(Commands::Migrate { action }) => {
            migrate::handle_migrate_command::<Migrator>(&config, action).await;
        }
        Some(Commands::Db { action }) => match action {
            Some(DbAction::Console) | None => db::handle_db_console_command(&config),
            Some(DbAction::Reset) => db_reset::handle_db_reset_command::<Migrator>(&config).await,
        },
        Some(Commands::Reminders {
            action: RemindersAction::Run { check, date },
        }) => {
            reminders::handle_reminders_run_command(environment, config, check, date).await;
        }
        Some(Commands::Version) => {
            version::print_version_info(AppInfo::current(), &job_registry());
        }
        Some(Commands::Serve) | None => {
            let schedule = job_schedule(&config);
            serve::handle_serve_command::<Migrator>(environment, config, job_registry(), schedule)
                .await;
        }
    }
}
