pub use sea_orm_migration::prelude::*;

mod m20260310_000001_create_workflows;
mod m20260310_000002_create_accountants;
mod m20260310_000003_create_profiles;
mod m20260311_000001_create_invoices;
mod m20260311_000002_create_automation_queue;
mod m20260312_000001_create_subscriptions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260310_000001_create_workflows::Migration),
            Box::new(m20260310_000002_create_accountants::Migration),
            Box::new(m20260310_000003_create_profiles::Migration),
            Box::new(m20260311_000001_create_invoices::Migration),
            Box::new(m20260311_000002_create_automation_queue::Migration),
            Box::new(m20260312_000001_create_subscriptions::Migration),
        ]
    }
}
