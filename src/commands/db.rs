use std::{
    error::Error,
    process::{self, Command},
};

use crate::config::{Config, DatabaseConfig};

/// Tables worth knowing about when poking at the database by hand.
const TABLES: [(&str, &str); 5] = [
    ("customer", "who gets notified"),
    ("rental_order", "status, rental_start and rental_end drive the reminder checks"),
    ("notification_log", "one row per finished dispatch, sent or failed"),
    ("job", "queued dispatch_notification and reminder_check jobs"),
    ("job_execution", "one row per job attempt"),
];

pub fn handle_db_console_command(config: &Config) {
    println!("🗄️  Opening the rentdesk database with psql...");
    print_table_guide();

    if let Err(e) = open_psql(&config.database) {
        eprintln!("❌ Failed to open database connection: {e}");
        process::exit(1);
    }
}

fn print_table_guide() {
    for (table, description) in TABLES {
        println!("   {table:<17} {description}");
    }
    println!("   (\\q quits, \\d <table> describes a table)");
    println!();
}

fn open_psql(db_config: &DatabaseConfig) -> Result<(), Box<dyn Error>> {
    let status = Command::new("psql").arg(&db_config.url).status()?;
    if !status.success() {
        return Err(format!("psql exited with code: {:?}", status.code()).into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_lists_the_notification_tables() {
        let tables: Vec<_> = TABLES.iter().map(|(table, _)| *table).collect();

        assert!(tables.contains(&"rental_order"));
        assert!(tables.contains(&"notification_log"));
    }
}
