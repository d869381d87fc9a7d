use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::CookieJar;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::types::SentVia;
use crate::error::ServerError;
use crate::handlers::account::AccountResponse;
use crate::identity::{Identity, clear_session_cookie, set_session_cookie};
use crate::state::AppState;
use crate::usecase::account::{
    ClientInfo, CompleteLoginUseCase, LoginInput, LoginUseCase, LogoutUseCase,
    RegisterAccountUseCase, RegisterInput, ResendOtpUseCase, VerifyRegistrationUseCase,
};

// ── Request/response types ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Phase-one answer for both register and login: who to verify as, and how
/// the code went out.
#[derive(Serialize)]
pub struct OtpChallengeResponse {
    pub user_id: Uuid,
    pub otp_sent_via: SentVia,
}

#[derive(Deserialize)]
pub struct VerifyBody {
    pub user_id: Uuid,
    pub otp_code: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub account: AccountResponse,
}

#[derive(Deserialize)]
pub struct ResendBody {
    pub user_id: Uuid,
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_owned());
    ClientInfo { ip, user_agent }
}

// ── POST /auth/register ──────────────────────────────────────────────────────

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ServerError> {
    let uc = RegisterAccountUseCase {
        accounts: state.account_repo(),
        issuer: state.otp_issuer(),
    };
    let registered = uc
        .execute(RegisterInput {
            username: body.username,
            email: body.email,
            password: body.password,
            phone: body.phone,
            role: body.role,
            address: body.address,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OtpChallengeResponse {
            user_id: registered.account_id,
            otp_sent_via: registered.sent_via,
        }),
    ))
}

// ── POST /auth/register/verify ───────────────────────────────────────────────

pub async fn verify_registration(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<AccountResponse>, ServerError> {
    let uc = VerifyRegistrationUseCase {
        accounts: state.account_repo(),
        verifier: state.otp_verifier(),
        notifications: state.notification_repo(),
        dispatch: state.dispatch.clone(),
    };
    let account = uc.execute(body.user_id, &body.otp_code).await?;
    Ok(Json(account.into()))
}

// ── POST /auth/login ─────────────────────────────────────────────────────────

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<OtpChallengeResponse>, ServerError> {
    let uc = LoginUseCase {
        accounts: state.account_repo(),
        issuer: state.otp_issuer(),
    };
    let challenge = uc
        .execute(LoginInput {
            username: body.username,
            password: body.password,
        })
        .await?;

    Ok(Json(OtpChallengeResponse {
        user_id: challenge.account_id,
        otp_sent_via: challenge.sent_via,
    }))
}

// ── POST /auth/login/verify ──────────────────────────────────────────────────

pub async fn verify_login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<VerifyBody>,
) -> Result<impl IntoResponse, ServerError> {
    let uc = CompleteLoginUseCase {
        accounts: state.account_repo(),
        sessions: state.session_repo(),
        verifier: state.otp_verifier(),
        session_ttl_secs: state.session_ttl_secs,
    };
    let established = uc
        .execute(body.user_id, &body.otp_code, client_info(&headers))
        .await?;

    let jar = set_session_cookie(
        jar,
        established.session.token.clone(),
        state.cookie_domain.clone(),
        state.session_ttl_secs,
    );
    Ok((
        StatusCode::OK,
        jar,
        Json(SessionResponse {
            token: established.session.token,
            account: established.account.into(),
        }),
    ))
}

// ── POST /auth/otp/resend ────────────────────────────────────────────────────

pub async fn resend_otp(
    State(state): State<AppState>,
    Json(body): Json<ResendBody>,
) -> Result<Json<OtpChallengeResponse>, ServerError> {
    let uc = ResendOtpUseCase {
        accounts: state.account_repo(),
        issuer: state.otp_issuer(),
    };
    let outcome = uc.execute(body.user_id).await?;

    Ok(Json(OtpChallengeResponse {
        user_id: body.user_id,
        otp_sent_via: outcome.sent_via,
    }))
}

// ── POST /auth/logout ────────────────────────────────────────────────────────

pub async fn logout(
    identity: Identity,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ServerError> {
    let uc = LogoutUseCase {
        sessions: state.session_repo(),
    };
    uc.execute(identity.session_id).await?;

    let jar = clear_session_cookie(jar, state.cookie_domain.clone());
    Ok((StatusCode::NO_CONTENT, jar))
}
