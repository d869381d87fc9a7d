use axum::Json;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::pagination::PageRequest;

use crate::domain::types::{Claim, ClaimStatus};
use crate::error::ServerError;
use crate::identity::Identity;
use crate::state::AppState;
use crate::usecase::claim::{
    CancelClaimUseCase, ConfirmClaimUseCase, CreateClaimUseCase, ListClaimsUseCase,
    VerifyCollectionUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

/// Claim snapshot for read endpoints. The confirmation code is not here,
/// deliberately: it leaves the server once, in the creation response.
#[derive(Serialize)]
pub struct ClaimResponse {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub beneficiary_id: Uuid,
    pub quantity: i32,
    pub status: ClaimStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mealdrop_core::serde::to_rfc3339_ms_opt"
    )]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "mealdrop_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Claim> for ClaimResponse {
    fn from(claim: Claim) -> Self {
        Self {
            id: claim.id,
            meal_id: claim.meal_id,
            beneficiary_id: claim.beneficiary_id,
            quantity: claim.quantity,
            status: claim.status,
            collected_at: claim.collected_at,
            created_at: claim.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct CreateClaimResponse {
    pub claim_id: Uuid,
    pub otp: String,
    pub confirmation_code: String,
}

#[derive(Serialize)]
pub struct CollectionResponse {
    pub collected: bool,
    pub claim: ClaimResponse,
}

// ── Query params ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ClaimListQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

// ── GET /claims ──────────────────────────────────────────────────────────────

pub async fn list_claims(
    identity: Identity,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<ClaimResponse>>, ServerError> {
    let query: ClaimListQuery = raw_query
        .as_deref()
        .map(serde_qs::from_str)
        .transpose()
        .map_err(|e| ServerError::InvalidQuery(e.to_string()))?
        .unwrap_or_default();

    let uc = ListClaimsUseCase {
        claims: state.claim_repo(),
    };
    let claims = uc
        .execute(
            identity.account_id,
            identity.role,
            PageRequest {
                per_page: query.per_page.unwrap_or(25),
                page: query.page.unwrap_or(1),
            },
        )
        .await?;

    Ok(Json(claims.into_iter().map(ClaimResponse::from).collect()))
}

// ── POST /claims ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateClaimBody {
    pub meal_id: Uuid,
    pub quantity: i32,
}

pub async fn create_claim(
    identity: Identity,
    State(state): State<AppState>,
    Json(body): Json<CreateClaimBody>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(AccountRole::Beneficiary)?;

    let uc = CreateClaimUseCase {
        accounts: state.account_repo(),
        claims: state.claim_repo(),
        meals: state.meal_repo(),
        issuer: state.otp_issuer(),
        notifications: state.notification_repo(),
    };
    let created = uc
        .execute(identity.account_id, body.meal_id, body.quantity)
        .await?;

    // Both pickup secrets appear in this response and nowhere else.
    Ok((
        StatusCode::CREATED,
        Json(CreateClaimResponse {
            claim_id: created.claim.id,
            otp: created.otp,
            confirmation_code: created.claim.confirmation_code,
        }),
    ))
}

// ── POST /claims/{id}/confirm ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConfirmBody {
    pub otp_code: String,
}

pub async fn confirm_claim(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<ClaimResponse>, ServerError> {
    identity.require(AccountRole::Beneficiary)?;

    let uc = ConfirmClaimUseCase {
        claims: state.claim_repo(),
        verifier: state.otp_verifier(),
    };
    let claim = uc.execute(identity.account_id, id, &body.otp_code).await?;
    Ok(Json(claim.into()))
}

// ── POST /claims/verify-collection ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct VerifyCollectionBody {
    pub claim_id: Uuid,
    pub code: String,
}

pub async fn verify_collection(
    identity: Identity,
    State(state): State<AppState>,
    Json(body): Json<VerifyCollectionBody>,
) -> Result<Json<CollectionResponse>, ServerError> {
    identity.require(AccountRole::Provider)?;

    let uc = VerifyCollectionUseCase {
        claims: state.claim_repo(),
        meals: state.meal_repo(),
        verifier: state.otp_verifier(),
        notifications: state.notification_repo(),
    };
    let claim = uc
        .execute(identity.account_id, body.claim_id, &body.code)
        .await?;

    Ok(Json(CollectionResponse {
        collected: true,
        claim: claim.into(),
    }))
}

// ── POST /claims/{id}/cancel ─────────────────────────────────────────────────

pub async fn cancel_claim(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimResponse>, ServerError> {
    let uc = CancelClaimUseCase {
        claims: state.claim_repo(),
        meals: state.meal_repo(),
    };
    let claim = uc.execute(identity.account_id, id).await?;
    Ok(Json(claim.into()))
}
