//! Persistence and delivery ports implemented by `infra`.

#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mealdrop_domain::geo::GeoPoint;
use mealdrop_domain::pagination::PageRequest;

use crate::domain::types::{
    Account, Claim, ClaimStatus, Meal, MealType, Notification, OtpPurpose, OtpRecord, Session,
};
use crate::error::ServerError;

pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, ServerError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServerError>;

    async fn username_taken(&self, username: &str) -> Result<bool, ServerError>;

    async fn email_taken(&self, email: &str) -> Result<bool, ServerError>;

    async fn phone_taken(&self, phone: &str) -> Result<bool, ServerError>;

    async fn create(&self, account: &Account) -> Result<(), ServerError>;

    async fn mark_phone_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError>;
}

pub trait OtpRepository: Send + Sync {
    /// Newest record for the pair, regardless of state.
    async fn find_latest(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, ServerError>;

    /// Expire every unverified, unexpired record for the pair. Returns the
    /// number of records retired.
    async fn expire_active(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError>;

    async fn create(&self, record: &OtpRecord) -> Result<(), ServerError>;

    /// Consume one submission slot if the record is unverified and fewer
    /// than `cap` attempts have been used. Returns false when no slot was
    /// available.
    async fn consume_attempt(&self, id: Uuid, cap: i32) -> Result<bool, ServerError>;

    /// Stamp `verified_at` exactly once. Returns false if the record was
    /// already verified.
    async fn mark_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError>;
}

pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), ServerError>;

    /// Unrevoked, unexpired session carrying `token`.
    async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, ServerError>;

    /// Stamp `revoked_at`. Revoking an already revoked session is a no-op.
    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError>;
}

/// Non-geographic listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MealFilter {
    /// Restrict to claimable meals (active, unexpired, stocked, upcoming).
    pub claimable_only: bool,
    pub meal_type: Option<MealType>,
    pub provider_id: Option<Uuid>,
}

pub trait MealRepository: Send + Sync {
    async fn create(&self, meal: &Meal) -> Result<(), ServerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meal>, ServerError>;

    async fn list(
        &self,
        filter: &MealFilter,
        page: PageRequest,
    ) -> Result<Vec<Meal>, ServerError>;

    /// Claimable meals whose advertised radius could cover `origin`,
    /// prefiltered by a per-meal bounding box. Callers still apply the
    /// exact distance check.
    async fn list_claimable_near(
        &self,
        origin: GeoPoint,
        meal_type: Option<MealType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meal>, ServerError>;

    /// Drop the provider's own listing switch.
    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError>;

    /// Flip `expired` on every meal whose serving time has passed or whose
    /// quantity has run out. Returns the number of meals retired.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, ServerError>;

    async fn count_by_provider(&self, provider_id: Uuid) -> Result<u64, ServerError>;

    async fn count_claimable_by_provider(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError>;
}

/// How the atomic quantity reservation inside claim creation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    MealMissing,
    NotClaimable,
    InsufficientQuantity,
}

pub trait ClaimRepository: Send + Sync {
    /// Insert `claim` and decrement the meal's remaining quantity as one
    /// atomic unit. Nothing is written unless the reservation holds.
    async fn create(
        &self,
        claim: &Claim,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, ServerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Claim>, ServerError>;

    /// Open (pending or confirmed) claim by this beneficiary on this meal.
    async fn find_open_for(
        &self,
        meal_id: Uuid,
        beneficiary_id: Uuid,
    ) -> Result<Option<Claim>, ServerError>;

    async fn confirmation_code_exists(&self, code: &str) -> Result<bool, ServerError>;

    /// Advance a pending claim to confirmed exactly once. Returns false when
    /// the claim was no longer pending.
    async fn mark_confirmed(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError>;

    /// Move an open claim to collected exactly once. Returns false when the
    /// claim was no longer open.
    async fn mark_collected(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError>;

    /// Cancel an open claim and hand its quantity back to the meal, in one
    /// transaction. Returns false when the claim was no longer open.
    async fn cancel_and_restore(
        &self,
        claim: &Claim,
        now: DateTime<Utc>,
    ) -> Result<bool, ServerError>;

    async fn list_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError>;

    /// Claims against any meal owned by `provider_id`.
    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError>;

    async fn count_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
        status: Option<ClaimStatus>,
    ) -> Result<u64, ServerError>;

    async fn count_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<ClaimStatus>,
    ) -> Result<u64, ServerError>;
}

pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), ServerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, ServerError>;

    async fn list_for_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ServerError>;

    async fn mark_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError>;

    /// Returns the number of notifications newly marked read.
    async fn mark_all_read(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError>;
}

/// Failure from an outbound message channel. Recorded on the notification
/// row, never propagated to callers.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// Outbound delivery channels. Implementations must not panic; a failed
/// send is an expected outcome.
pub trait DispatchPort: Send + Sync {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<(), DispatchError>;

    async fn send_email(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError>;
}
