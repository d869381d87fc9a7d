use axum::Json;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::pagination::PageRequest;

use crate::domain::types::{Meal, MealType};
use crate::error::ServerError;
use crate::identity::Identity;
use crate::state::AppState;
use crate::usecase::meal::{
    AccountStats, CreateMealInput, CreateMealUseCase, DeactivateMealUseCase, GetMealUseCase,
    ListMealsQuery, ListMealsUseCase, ListedMeal, MealStatsUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MealResponse {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub meal_type: MealType,
    pub total_quantity: i32,
    pub remaining_quantity: i32,
    #[serde(serialize_with = "mealdrop_core::serde::to_rfc3339_ms")]
    pub serving_at: DateTime<Utc>,
    pub pickup_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub active: bool,
    pub expired: bool,
    /// Present only on geographic listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(serialize_with = "mealdrop_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl MealResponse {
    fn from_meal(meal: Meal, distance_km: Option<f64>) -> Self {
        Self {
            id: meal.id,
            provider_id: meal.provider_id,
            name: meal.name,
            description: meal.description,
            meal_type: meal.meal_type,
            total_quantity: meal.total_quantity,
            remaining_quantity: meal.remaining_quantity,
            serving_at: meal.serving_at,
            pickup_address: meal.pickup_address,
            latitude: meal.location.latitude,
            longitude: meal.location.longitude,
            radius_km: meal.radius_km,
            active: meal.active,
            expired: meal.expired,
            distance_km,
            created_at: meal.created_at,
        }
    }
}

impl From<Meal> for MealResponse {
    fn from(meal: Meal) -> Self {
        Self::from_meal(meal, None)
    }
}

impl From<ListedMeal> for MealResponse {
    fn from(listed: ListedMeal) -> Self {
        Self::from_meal(listed.meal, listed.distance_km)
    }
}

// ── Query params ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct MealListQuery {
    pub active: Option<bool>,
    pub meal_type: Option<String>,
    pub provider: Option<Uuid>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

// ── GET /meals ───────────────────────────────────────────────────────────────

pub async fn list_meals(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<MealResponse>>, ServerError> {
    let query: MealListQuery = raw_query
        .as_deref()
        .map(serde_qs::from_str)
        .transpose()
        .map_err(|e| ServerError::InvalidQuery(e.to_string()))?
        .unwrap_or_default();

    let uc = ListMealsUseCase {
        meals: state.meal_repo(),
    };
    let listed = uc
        .execute(ListMealsQuery {
            active: query.active,
            meal_type: query.meal_type,
            provider_id: query.provider,
            latitude: query.lat,
            longitude: query.lng,
            page: PageRequest {
                per_page: query.per_page.unwrap_or(25),
                page: query.page.unwrap_or(1),
            },
        })
        .await?;

    Ok(Json(listed.into_iter().map(MealResponse::from).collect()))
}

// ── POST /meals ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateMealBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub meal_type: String,
    pub quantity: i32,
    pub serving_at: DateTime<Utc>,
    pub pickup_address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub radius_km: Option<f64>,
}

pub async fn create_meal(
    identity: Identity,
    State(state): State<AppState>,
    Json(body): Json<CreateMealBody>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(AccountRole::Provider)?;

    let uc = CreateMealUseCase {
        meals: state.meal_repo(),
    };
    let meal = uc
        .execute(
            identity.account_id,
            CreateMealInput {
                name: body.name,
                description: body.description,
                meal_type: body.meal_type,
                quantity: body.quantity,
                serving_at: body.serving_at,
                pickup_address: body.pickup_address,
                latitude: body.latitude,
                longitude: body.longitude,
                radius_km: body.radius_km,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(MealResponse::from(meal))))
}

// ── GET /meals/stats ─────────────────────────────────────────────────────────

pub async fn meal_stats(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<AccountStats>, ServerError> {
    let uc = MealStatsUseCase {
        meals: state.meal_repo(),
        claims: state.claim_repo(),
    };
    let stats = uc.execute(identity.account_id, identity.role).await?;
    Ok(Json(stats))
}

// ── GET /meals/{id} ──────────────────────────────────────────────────────────

pub async fn get_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MealResponse>, ServerError> {
    let uc = GetMealUseCase {
        meals: state.meal_repo(),
    };
    let meal = uc.execute(id).await?;
    Ok(Json(meal.into()))
}

// ── POST /meals/{id}/deactivate ──────────────────────────────────────────────

pub async fn deactivate_meal(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MealResponse>, ServerError> {
    identity.require(AccountRole::Provider)?;

    let uc = DeactivateMealUseCase {
        meals: state.meal_repo(),
    };
    let meal = uc.execute(identity.account_id, id).await?;
    Ok(Json(meal.into()))
}
