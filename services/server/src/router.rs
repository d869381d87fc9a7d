use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use mealdrop_core::health::healthz;
use mealdrop_core::middleware::request_id_layer;

use crate::handlers::{
    account::get_me,
    auth::{login, logout, register, resend_otp, verify_login, verify_registration},
    claim::{cancel_claim, confirm_claim, create_claim, list_claims, verify_collection},
    health::readyz,
    meal::{create_meal, deactivate_meal, get_meal, list_meals, meal_stats},
    notification::{list_notifications, mark_all_read, mark_read},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Two-phase auth
        .route("/auth/register", post(register))
        .route("/auth/register/verify", post(verify_registration))
        .route("/auth/login", post(login))
        .route("/auth/login/verify", post(verify_login))
        .route("/auth/otp/resend", post(resend_otp))
        .route("/auth/logout", post(logout))
        // Accounts
        .route("/accounts/@me", get(get_me))
        // Meal catalog
        .route("/meals", get(list_meals))
        .route("/meals", post(create_meal))
        .route("/meals/stats", get(meal_stats))
        .route("/meals/{id}", get(get_meal))
        .route("/meals/{id}/deactivate", post(deactivate_meal))
        // Claims
        .route("/claims", get(list_claims))
        .route("/claims", post(create_claim))
        .route("/claims/verify-collection", post(verify_collection))
        .route("/claims/{id}/confirm", post(confirm_claim))
        .route("/claims/{id}/cancel", post(cancel_claim))
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
