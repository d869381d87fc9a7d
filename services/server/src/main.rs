use sea_orm::Database;
use tracing::info;

use mealdrop_server::config::ServerConfig;
use mealdrop_server::router::build_router;
use mealdrop_server::state::AppState;
use mealdrop_server::usecase::meal::SweepExpiredMealsUseCase;

#[tokio::main]
async fn main() {
    mealdrop_core::tracing::init_tracing();

    let config = ServerConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let state = AppState::new(db, &config);

    // Optional background sweep; listings stay correct without it.
    if let Some(interval_secs) = config.sweep_interval_secs {
        let sweeper = SweepExpiredMealsUseCase {
            meals: state.meal_repo(),
        };
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                if let Err(e) = sweeper.execute().await {
                    tracing::error!(error = %e, "meal sweep failed");
                }
            }
        });
        info!("meal sweep running every {interval_secs}s");
    }

    let router = build_router(state);
    let http_addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind");

    info!("mealdrop server listening on {http_addr}");
    axum::serve(listener, router).await.expect("server error");
}
