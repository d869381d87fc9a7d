use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use mealdrop_core::error::error_response;

/// Server domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    // request validation
    #[error("invalid username")]
    InvalidUsername,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("password must be at least 8 characters")]
    InvalidPassword,
    #[error("invalid role")]
    InvalidRole,
    #[error("invalid quantity")]
    InvalidQuantity,
    #[error("invalid coordinates")]
    InvalidCoordinates,
    #[error("invalid pickup radius")]
    InvalidRadius,
    #[error("serving time must be in the future")]
    InvalidServingTime,
    #[error("invalid meal type")]
    InvalidMealType,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    // credential and code failures; the response body is deliberately
    // uniform so callers cannot tell which check failed
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no matching code")]
    OtpNotFound,
    #[error("code expired")]
    OtpExpired,
    #[error("code mismatch")]
    OtpMismatch,
    #[error("attempt limit reached")]
    OtpAttemptsExceeded,
    #[error("code already verified")]
    OtpAlreadyVerified,

    // session and role gate
    #[error("missing or invalid session")]
    Unauthorized,
    #[error("account not verified")]
    AccountNotVerified,
    #[error("forbidden")]
    Forbidden,

    // lookups
    #[error("account not found")]
    AccountNotFound,
    #[error("meal not found")]
    MealNotFound,
    #[error("claim not found")]
    ClaimNotFound,
    #[error("notification not found")]
    NotificationNotFound,

    // state conflicts
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already taken")]
    EmailTaken,
    #[error("phone number already taken")]
    PhoneTaken,
    #[error("meal already claimed")]
    AlreadyClaimed,
    #[error("meal is not claimable")]
    MealInactive,
    #[error("not enough portions remaining")]
    InsufficientQuantity,
    #[error("claim already collected")]
    AlreadyCollected,
    #[error("claim is cancelled")]
    ClaimCancelled,
    #[error("collection code mismatch")]
    CodeMismatch,
    #[error("claim state does not allow this")]
    InvalidTransition,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUsername => "INVALID_USERNAME",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidPhone => "INVALID_PHONE",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidRole => "INVALID_ROLE",
            Self::InvalidQuantity => "INVALID_QUANTITY",
            Self::InvalidCoordinates => "INVALID_COORDINATES",
            Self::InvalidRadius => "INVALID_RADIUS",
            Self::InvalidServingTime => "INVALID_SERVING_TIME",
            Self::InvalidMealType => "INVALID_MEAL_TYPE",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::OtpNotFound => "OTP_NOT_FOUND",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::OtpMismatch => "OTP_MISMATCH",
            Self::OtpAttemptsExceeded => "OTP_ATTEMPTS_EXCEEDED",
            Self::OtpAlreadyVerified => "OTP_ALREADY_VERIFIED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
            Self::Forbidden => "FORBIDDEN",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::MealNotFound => "MEAL_NOT_FOUND",
            Self::ClaimNotFound => "CLAIM_NOT_FOUND",
            Self::NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::PhoneTaken => "PHONE_TAKEN",
            Self::AlreadyClaimed => "ALREADY_CLAIMED",
            Self::MealInactive => "MEAL_INACTIVE",
            Self::InsufficientQuantity => "INSUFFICIENT_QUANTITY",
            Self::AlreadyCollected => "ALREADY_COLLECTED",
            Self::ClaimCancelled => "CLAIM_CANCELLED",
            Self::CodeMismatch => "CODE_MISMATCH",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// True for every failure of the password or one-time-code checks.
    /// These all surface as one opaque 401.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::OtpNotFound
                | Self::OtpExpired
                | Self::OtpMismatch
                | Self::OtpAttemptsExceeded
                | Self::OtpAlreadyVerified
        )
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_auth_failure() {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "AUTH_FAILED",
                "authentication failed",
            );
        }
        let status = match &self {
            Self::InvalidUsername
            | Self::InvalidEmail
            | Self::InvalidPhone
            | Self::InvalidPassword
            | Self::InvalidRole
            | Self::InvalidQuantity
            | Self::InvalidCoordinates
            | Self::InvalidRadius
            | Self::InvalidServingTime
            | Self::InvalidMealType
            | Self::MissingField(_)
            | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::OtpNotFound
            | Self::OtpExpired
            | Self::OtpMismatch
            | Self::OtpAttemptsExceeded
            | Self::OtpAlreadyVerified
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AccountNotVerified | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::AccountNotFound
            | Self::MealNotFound
            | Self::ClaimNotFound
            | Self::NotificationNotFound => StatusCode::NOT_FOUND,
            Self::UsernameTaken
            | Self::EmailTaken
            | Self::PhoneTaken
            | Self::AlreadyClaimed
            | Self::MealInactive
            | Self::InsufficientQuantity
            | Self::AlreadyCollected
            | Self::ClaimCancelled
            | Self::CodeMismatch
            | Self::InvalidTransition => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // 4xx responses go out unlogged; TraceLayer already records method,
        // uri, and status. The anyhow chain on internal errors is only
        // visible here, so log it before it is flattened to a bare 500.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        error_response(status, self.kind(), self.to_string())
    }
}
