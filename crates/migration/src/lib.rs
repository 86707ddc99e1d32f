pub use sea_orm_migration::prelude::*;

mod m20251001_090000_add_onboarding_tables;
mod m20251004_120000_add_notification_ledger;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_090000_add_onboarding_tables::Migration),
            Box::new(m20251004_120000_add_notification_ledger::Migration),
        ]
    }
}
