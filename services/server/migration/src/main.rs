use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(mealdrop_server_migration::Migrator).await;
}
