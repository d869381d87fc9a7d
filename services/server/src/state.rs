//! Shared handler state and usecase wiring.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::{OtpConfig, ServerConfig};
use crate::infra::db::{
    DbAccountRepository, DbClaimRepository, DbMealRepository, DbNotificationRepository,
    DbOtpRepository, DbSessionRepository,
};
use crate::infra::dispatch::GatewayDispatcher;
use crate::usecase::otp::{IssueOtpUseCase, VerifyOtpUseCase};

/// Everything a handler needs. Cloned per request; the connection pool and
/// the HTTP client are shared under the hood. The connection sits behind an
/// `Arc` because `DatabaseConnection` stops being `Clone` once the `mock`
/// feature is on.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub dispatch: GatewayDispatcher,
    pub cookie_domain: String,
    pub otp_config: OtpConfig,
    pub session_ttl_secs: i64,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &ServerConfig) -> Self {
        Self {
            db: Arc::new(db),
            dispatch: GatewayDispatcher::from_config(config),
            cookie_domain: config.cookie_domain.clone(),
            otp_config: config.otp,
            session_ttl_secs: config.session_ttl_secs,
        }
    }

    pub fn account_repo(&self) -> DbAccountRepository {
        DbAccountRepository {
            db: self.db.clone(),
        }
    }

    pub fn otp_repo(&self) -> DbOtpRepository {
        DbOtpRepository {
            db: self.db.clone(),
        }
    }

    pub fn session_repo(&self) -> DbSessionRepository {
        DbSessionRepository {
            db: self.db.clone(),
        }
    }

    pub fn meal_repo(&self) -> DbMealRepository {
        DbMealRepository {
            db: self.db.clone(),
        }
    }

    pub fn claim_repo(&self) -> DbClaimRepository {
        DbClaimRepository {
            db: self.db.clone(),
        }
    }

    pub fn notification_repo(&self) -> DbNotificationRepository {
        DbNotificationRepository {
            db: self.db.clone(),
        }
    }

    /// Issuer wired to the outbound gateways.
    pub fn otp_issuer(
        &self,
    ) -> IssueOtpUseCase<DbOtpRepository, DbNotificationRepository, GatewayDispatcher> {
        IssueOtpUseCase {
            otp_codes: self.otp_repo(),
            notifications: self.notification_repo(),
            dispatch: self.dispatch.clone(),
            config: self.otp_config,
        }
    }

    pub fn otp_verifier(&self) -> VerifyOtpUseCase<DbOtpRepository> {
        VerifyOtpUseCase {
            otp_codes: self.otp_repo(),
            config: self.otp_config,
        }
    }
}
