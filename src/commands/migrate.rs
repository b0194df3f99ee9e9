use std::{cmp, error::Error, process};

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use crate::{cli::MigrateAction, config::Config, database::setup_database_connection};

pub async fn handle_migrate_command<AppMigrator: MigratorTrait>(
    config: &Config,
    action: MigrateAction,
) {
    let result = match setup_database_connection(&config.database).await {
        Ok(db) => handle_migration_command::<AppMigrator>(&db, action).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Migration failed: {e}");
        process::exit(1);
    }
}

fn print_names<'a>(names: impl Iterator<Item = &'a str>, marker: &str) {
    for name in names {
        println!("  {marker} {name}");
    }
}

pub async fn handle_migration_command<AppMigrator: MigratorTrait>(
    db: &DatabaseConnection,
    action: MigrateAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        MigrateAction::Up { steps } => {
            let pending = AppMigrator::get_pending_migrations(db).await?;
            if pending.is_empty() {
                println!("✅ All migrations are already up to date");
                return Ok(());
            }

            let count = steps.map_or(pending.len(), |steps| {
                cmp::min(steps as usize, pending.len())
            });
            println!("Running {count} migration(s) up:");
            print_names(pending[..count].iter().map(|m| m.name()), "📄");

            AppMigrator::up(db, steps).await?;
            println!("✅ Migrations completed successfully");
        }
        MigrateAction::Down { steps } => {
            let applied = AppMigrator::get_applied_migrations(db).await?;
            if applied.is_empty() {
                println!("❌ No migrations to roll back");
                return Ok(());
            }

            let count = cmp::min(steps as usize, applied.len());
            println!("Rolling back {count} migration(s):");
            print_names(
                applied[applied.len() - count..].iter().rev().map(|m| m.name()),
                "📄",
            );

            AppMigrator::down(db, Some(steps)).await?;
            println!("✅ Rollback completed successfully");
        }
        MigrateAction::Status => {
            let pending = AppMigrator::get_pending_migrations(db).await?;
            let applied = AppMigrator::get_applied_migrations(db).await?;

            println!("📋 Applied migrations:");
            print_names(applied.iter().map(|m| m.name()), "✓");
            if pending.is_empty() {
                println!("✅ All migrations are up to date");
            } else {
                println!("📋 Pending migrations:");
                print_names(pending.iter().map(|m| m.name()), "-");
            }
        }
        MigrateAction::Reset => {
            println!("🔄 Resetting database (this will drop all data!)...");

            let applied = AppMigrator::get_applied_migrations(db).await?;
            let applied_count =
                u32::try_from(applied.len()).map_err(|_| "Too many migrations to reset")?;
            if applied_count > 0 {
                AppMigrator::down(db, Some(applied_count)).await?;
                println!("✅ Rolled back {applied_count} migration(s)");
            }

            AppMigrator::up(db, None).await?;
            println!("✅ Database reset completed successfully");
        }
        MigrateAction::Reapply { steps } => {
            let applied = AppMigrator::get_applied_migrations(db).await?;
            if applied.is_empty() {
                println!("❌ No migrations to reapply");
                return Ok(());
            }

            let count = cmp::min(steps as usize, applied.len());
            println!("🔄 Reapplying {count} migration(s):");
            print_names(
                applied[applied.len() - count..].iter().rev().map(|m| m.name()),
                "📄",
            );

            AppMigrator::down(db, Some(steps)).await?;
            AppMigrator::up(db, Some(steps)).await?;
            println!("✅ Reapply completed successfully");
        }
    }

    Ok(())
}
