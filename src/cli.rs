use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::notifications::reminders::ReminderCheck;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server, job workers and scheduler (default)
    Serve,
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Database management commands
    Db {
        #[command(subcommand)]
        action: Option<DbAction>,
    },
    /// Reminder checks
    Reminders {
        #[command(subcommand)]
        action: RemindersAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum DbAction {
    /// Open a database connection with psql
    Console,
    /// Drop and recreate the database, then run all migrations
    Reset,
}

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Run a check now and enqueue the notifications it finds
    Run {
        #[arg(value_enum)]
        check: ReminderCheck,
        /// Day to run the check for, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Run migrations up
    Up {
        /// Number of migrations to run (default: all)
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Run migrations down
    Down {
        /// Number of migrations to rollback (default: 1)
        #[arg(short, long, default_value = "1")]
        steps: u32,
    },
    /// Show migration status
    Status,
    /// Roll back everything, then run all migrations
    Reset,
    /// Reapply recent migrations (down then up)
    Reapply {
        /// Number of migrations to reapply (default: 1)
        #[arg(short, long, default_value = "1")]
        steps: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reminder_run_with_date() {
        let cli = Cli::try_parse_from([
            "rentdesk",
            "reminders",
            "run",
            "overdue",
            "--date",
            "2026-10-19",
        ])
        .unwrap();

        let Some(Commands::Reminders {
            action: RemindersAction::Run { check, date },
        }) = cli.command
        else {
            panic!("expected reminders run");
        };
        assert_eq!(check, ReminderCheck::Overdue);
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 10, 19));
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["rentdesk"]).unwrap();

        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_unknown_checks() {
        assert!(Cli::try_parse_from(["rentdesk", "reminders", "run", "weekly"]).is_err());
    }
}
