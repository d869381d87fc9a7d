//! Meal posting, discovery, and lifecycle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::geo::GeoPoint;
use mealdrop_domain::pagination::PageRequest;

use crate::domain::repository::{ClaimRepository, MealFilter, MealRepository};
use crate::domain::types::{
    ClaimStatus, DEFAULT_RADIUS_KM, MAX_MEAL_QUANTITY, MAX_RADIUS_KM, MIN_RADIUS_KM, Meal,
    MealType,
};
use crate::error::ServerError;

pub struct CreateMealInput {
    pub name: String,
    pub description: Option<String>,
    pub meal_type: String,
    pub quantity: i32,
    pub serving_at: DateTime<Utc>,
    pub pickup_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

pub struct CreateMealUseCase<M: MealRepository> {
    pub meals: M,
}

impl<M: MealRepository> CreateMealUseCase<M> {
    pub async fn execute(
        &self,
        provider_id: Uuid,
        input: CreateMealInput,
    ) -> Result<Meal, ServerError> {
        // 1. Field validation, cheapest checks first.
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServerError::MissingField("name"));
        }
        let pickup_address = input.pickup_address.trim();
        if pickup_address.is_empty() {
            return Err(ServerError::MissingField("pickup_address"));
        }
        let meal_type = MealType::parse(&input.meal_type).ok_or(ServerError::InvalidMealType)?;
        if !(1..=MAX_MEAL_QUANTITY).contains(&input.quantity) {
            return Err(ServerError::InvalidQuantity);
        }
        let now = Utc::now();
        if input.serving_at <= now {
            return Err(ServerError::InvalidServingTime);
        }
        let location = GeoPoint::new(input.latitude, input.longitude);
        if !location.in_range() {
            return Err(ServerError::InvalidCoordinates);
        }
        let radius_km = input.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        if !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius_km) {
            return Err(ServerError::InvalidRadius);
        }

        // 2. Persist fully stocked and live.
        let meal = Meal {
            id: Uuid::now_v7(),
            provider_id,
            name: name.to_owned(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            meal_type,
            total_quantity: input.quantity,
            remaining_quantity: input.quantity,
            serving_at: input.serving_at,
            pickup_address: pickup_address.to_owned(),
            location,
            radius_km,
            active: true,
            expired: false,
            created_at: now,
            updated_at: now,
        };
        self.meals.create(&meal).await?;
        Ok(meal)
    }
}

/// Catalog query as the handler parsed it. Coordinates must come as a pair;
/// `active` defaults to true, restricting the listing to claimable meals.
#[derive(Debug, Clone, Default)]
pub struct ListMealsQuery {
    pub active: Option<bool>,
    pub meal_type: Option<String>,
    pub provider_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub page: PageRequest,
}

/// A catalog row plus the requester's distance when the query carried an
/// origin.
#[derive(Debug, Clone)]
pub struct ListedMeal {
    pub meal: Meal,
    pub distance_km: Option<f64>,
}

pub struct ListMealsUseCase<M: MealRepository> {
    pub meals: M,
}

impl<M: MealRepository> ListMealsUseCase<M> {
    pub async fn execute(&self, query: ListMealsQuery) -> Result<Vec<ListedMeal>, ServerError> {
        let meal_type = match query.meal_type.as_deref() {
            Some(raw) => Some(MealType::parse(raw).ok_or(ServerError::InvalidMealType)?),
            None => None,
        };
        let origin = match (query.latitude, query.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            (None, None) => None,
            _ => return Err(ServerError::InvalidCoordinates),
        };
        let page = query.page.clamped();

        // 1. Geographic browse: the repository prefilters by a per-meal
        //    bounding box, the exact radius check and nearest-first order
        //    happen here.
        if let Some(origin) = origin {
            if !origin.in_range() {
                return Err(ServerError::InvalidCoordinates);
            }
            let candidates = self
                .meals
                .list_claimable_near(origin, meal_type, Utc::now())
                .await?;

            let mut hits: Vec<(f64, Meal)> = candidates
                .into_iter()
                .filter_map(|meal| {
                    let distance = origin.distance_km(&meal.location);
                    (distance <= meal.radius_km).then_some((distance, meal))
                })
                .collect();
            hits.sort_by(|a, b| a.0.total_cmp(&b.0));

            return Ok(hits
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .map(|(distance, meal)| ListedMeal {
                    meal,
                    distance_km: Some(distance),
                })
                .collect());
        }

        // 2. Flat listing, newest first in the repository.
        let filter = MealFilter {
            claimable_only: query.active.unwrap_or(true),
            meal_type,
            provider_id: query.provider_id,
        };
        let meals = self.meals.list(&filter, page).await?;
        Ok(meals
            .into_iter()
            .map(|meal| ListedMeal {
                meal,
                distance_km: None,
            })
            .collect())
    }
}

pub struct GetMealUseCase<M: MealRepository> {
    pub meals: M,
}

impl<M: MealRepository> GetMealUseCase<M> {
    pub async fn execute(&self, meal_id: Uuid) -> Result<Meal, ServerError> {
        self.meals
            .find_by_id(meal_id)
            .await?
            .ok_or(ServerError::MealNotFound)
    }
}

pub struct DeactivateMealUseCase<M: MealRepository> {
    pub meals: M,
}

impl<M: MealRepository> DeactivateMealUseCase<M> {
    pub async fn execute(&self, provider_id: Uuid, meal_id: Uuid) -> Result<Meal, ServerError> {
        // 1. Ownership by masking: someone else's meal reads as absent.
        let meal = self
            .meals
            .find_by_id(meal_id)
            .await?
            .ok_or(ServerError::MealNotFound)?;
        if meal.provider_id != provider_id {
            return Err(ServerError::MealNotFound);
        }

        // 2. Already off is a no-op.
        if !meal.active {
            return Ok(meal);
        }
        let now = Utc::now();
        self.meals.deactivate(meal.id, now).await?;
        Ok(Meal {
            active: false,
            updated_at: now,
            ..meal
        })
    }
}

/// Retires meals whose serving time has passed or whose portions ran out.
/// Safe to run at any moment; listings and the claim guard re-check the
/// same conditions themselves.
pub struct SweepExpiredMealsUseCase<M: MealRepository> {
    pub meals: M,
}

impl<M: MealRepository> SweepExpiredMealsUseCase<M> {
    pub async fn execute(&self) -> Result<u64, ServerError> {
        let retired = self.meals.sweep_expired(Utc::now()).await?;
        if retired > 0 {
            tracing::info!(retired, "meal sweep retired listings");
        }
        Ok(retired)
    }
}

/// Dashboard counters, shaped by the caller's role.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AccountStats {
    Provider {
        total_meals: u64,
        active_meals: u64,
        claims_received: u64,
        collected_claims: u64,
    },
    Beneficiary {
        total_claims: u64,
        collected_claims: u64,
        pending_claims: u64,
    },
}

pub struct MealStatsUseCase<M, C>
where
    M: MealRepository,
    C: ClaimRepository,
{
    pub meals: M,
    pub claims: C,
}

impl<M, C> MealStatsUseCase<M, C>
where
    M: MealRepository,
    C: ClaimRepository,
{
    pub async fn execute(
        &self,
        account_id: Uuid,
        role: AccountRole,
    ) -> Result<AccountStats, ServerError> {
        match role {
            AccountRole::Provider => Ok(AccountStats::Provider {
                total_meals: self.meals.count_by_provider(account_id).await?,
                active_meals: self
                    .meals
                    .count_claimable_by_provider(account_id, Utc::now())
                    .await?,
                claims_received: self.claims.count_for_provider(account_id, None).await?,
                collected_claims: self
                    .claims
                    .count_for_provider(account_id, Some(ClaimStatus::Collected))
                    .await?,
            }),
            AccountRole::Beneficiary => Ok(AccountStats::Beneficiary {
                total_claims: self.claims.count_for_beneficiary(account_id, None).await?,
                collected_claims: self
                    .claims
                    .count_for_beneficiary(account_id, Some(ClaimStatus::Collected))
                    .await?,
                pending_claims: self
                    .claims
                    .count_for_beneficiary(account_id, Some(ClaimStatus::Pending))
                    .await?,
            }),
        }
    }
}
