use sea_orm_migration::prelude::*;

mod m20260801_000001_create_accounts;
mod m20260801_000002_create_otp_codes;
mod m20260801_000003_create_sessions;
mod m20260801_000004_create_meals;
mod m20260801_000005_create_claims;
mod m20260801_000006_create_notifications;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_accounts::Migration),
            Box::new(m20260801_000002_create_otp_codes::Migration),
            Box::new(m20260801_000003_create_sessions::Migration),
            Box::new(m20260801_000004_create_meals::Migration),
            Box::new(m20260801_000005_create_claims::Migration),
            Box::new(m20260801_000006_create_notifications::Migration),
        ]
    }
}
