use axum::Json;
use axum::extract::State;
use serde::Serialize;
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;

use crate::domain::types::Account;
use crate::error::ServerError;
use crate::identity::Identity;
use crate::state::AppState;
use crate::usecase::account::GetAccountUseCase;

// ── Response types ───────────────────────────────────────────────────────────

/// Public account snapshot. The password hash never leaves the service.
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: AccountRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub phone_verified: bool,
    #[serde(serialize_with = "mealdrop_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            phone: account.phone,
            role: account.role,
            address: account.address,
            phone_verified: account.phone_verified,
            created_at: account.created_at,
        }
    }
}

// ── GET /accounts/@me ────────────────────────────────────────────────────────

pub async fn get_me(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ServerError> {
    let uc = GetAccountUseCase {
        accounts: state.account_repo(),
    };
    let account = uc.execute(identity.account_id).await?;
    Ok(Json(account.into()))
}
