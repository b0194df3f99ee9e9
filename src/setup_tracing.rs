use time::{format_description::parse_borrowed, UtcOffset};
use tracing_subscriber::{fmt::time::OffsetTime, EnvFilter};

use crate::cli::Commands;

const QUIET_DIRECTIVES: [&str; 2] = [
    "sqlx::postgres::notice=warn",
    "sea_orm_migration::migrator=warn",
];

/// Default filter for a command; `RUST_LOG` overrides it.
fn default_level<'a>(command: Option<&Commands>, server_log_level: &'a str) -> &'a str {
    match command {
        Some(Commands::Migrate { .. } | Commands::Db { .. }) => "warn",
        Some(Commands::Version) => "error",
        Some(Commands::Reminders { .. } | Commands::Serve) | None => server_log_level,
    }
}

pub fn setup_tracing_for_command(command: Option<&Commands>, server_log_level: &str) {
    let mut env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(command, server_log_level)));
    for directive in QUIET_DIRECTIVES {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(true)
        .compact();

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    match parse_borrowed::<2>("[hour]:[minute]:[second].[subsecond digits:2]") {
        Ok(format) => subscriber
            .with_timer(OffsetTime::new(offset, format))
            .init(),
        Err(_) => subscriber.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_commands_are_quiet() {
        let command = Commands::Db { action: None };

        assert_eq!(default_level(Some(&command), "info"), "warn");
        assert_eq!(default_level(Some(&Commands::Version), "info"), "error");
        assert_eq!(default_level(None, "debug"), "debug");
    }
}
