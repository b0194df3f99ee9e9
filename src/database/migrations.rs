pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_job_queue;
mod m20261001_000002_create_rental_tables;
mod m20261001_000003_create_notification_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_job_queue::Migration),
            Box::new(m20261001_000002_create_rental_tables::Migration),
            Box::new(m20261001_000003_create_notification_log::Migration),
        ]
    }
}
