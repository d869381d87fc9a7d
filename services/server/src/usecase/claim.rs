//! Claim lifecycle: reserve, confirm, hand over, cancel.
//!
//! The quantity ledger lives on the meal row. Reservation and restore are
//! conditional updates inside the repository, so two claims racing for the
//! last portion can never both win.

use chrono::Utc;
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::pagination::PageRequest;

use crate::domain::repository::{
    AccountRepository, ClaimRepository, DispatchPort, MealRepository, NotificationRepository,
    OtpRepository, ReserveOutcome,
};
use crate::domain::types::{
    CONFIRMATION_CODE_LEN, Claim, ClaimStatus, Meal, Notification, NotificationChannel,
    OtpPurpose,
};
use crate::error::ServerError;
use crate::usecase::otp::{IssueOtpUseCase, VerifyOtpUseCase};
use crate::usecase::random_string;

const CONFIRMATION_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const CODE_RETRIES: usize = 10;

/// Created claim plus the collection code. Both secrets leave the server
/// exactly once, in this value; no read endpoint ever reprints them.
#[derive(Debug, Clone)]
pub struct CreatedClaim {
    pub claim: Claim,
    pub otp: String,
}

pub struct CreateClaimUseCase<A, C, M, O, N, D>
where
    A: AccountRepository,
    C: ClaimRepository,
    M: MealRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub accounts: A,
    pub claims: C,
    pub meals: M,
    pub issuer: IssueOtpUseCase<O, N, D>,
    pub notifications: N,
}

impl<A, C, M, O, N, D> CreateClaimUseCase<A, C, M, O, N, D>
where
    A: AccountRepository,
    C: ClaimRepository,
    M: MealRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub async fn execute(
        &self,
        beneficiary_id: Uuid,
        meal_id: Uuid,
        quantity: i32,
    ) -> Result<CreatedClaim, ServerError> {
        // 1. Portion count first.
        if quantity < 1 {
            return Err(ServerError::InvalidQuantity);
        }

        // 2. The account behind the session; needed for code delivery.
        let beneficiary = self
            .accounts
            .find_by_id(beneficiary_id)
            .await?
            .ok_or(ServerError::AccountNotFound)?;

        // 3. Fast-path answers before any write. The transactional reserve
        //    below re-checks all of this under the row lock.
        let meal = self
            .meals
            .find_by_id(meal_id)
            .await?
            .ok_or(ServerError::MealNotFound)?;
        // A live meal that is merely out of portions is a quantity problem,
        // not an inactive one, so the depletion check cannot hide behind
        // `is_claimable_at` (whose remaining > 0 term exists for listings).
        let now = Utc::now();
        if !meal.active || meal.expired || meal.serving_at <= now {
            return Err(ServerError::MealInactive);
        }
        if quantity > meal.remaining_quantity {
            return Err(ServerError::InsufficientQuantity);
        }

        // 4. One open claim per (beneficiary, meal).
        if self
            .claims
            .find_open_for(meal_id, beneficiary_id)
            .await?
            .is_some()
        {
            return Err(ServerError::AlreadyClaimed);
        }

        // 5. Unique pickup code, bounded retries.
        let confirmation_code = self.unique_confirmation_code().await?;

        // 6. Reserve the portions and insert the claim atomically.
        let claim = Claim {
            id: Uuid::now_v7(),
            meal_id,
            beneficiary_id,
            quantity,
            status: ClaimStatus::Pending,
            confirmation_code,
            collected_at: None,
            created_at: now,
            updated_at: now,
        };
        match self.claims.create(&claim, now).await? {
            ReserveOutcome::Reserved => {}
            ReserveOutcome::MealMissing => return Err(ServerError::MealNotFound),
            ReserveOutcome::NotClaimable => return Err(ServerError::MealInactive),
            ReserveOutcome::InsufficientQuantity => {
                return Err(ServerError::InsufficientQuantity);
            }
        }

        // 7. Collection code to the beneficiary, heads-up to the provider.
        let issued = self.issuer.execute(&beneficiary, OtpPurpose::Collection).await?;
        self.notify_provider(&meal, &claim).await?;

        Ok(CreatedClaim {
            claim,
            otp: issued.record.code,
        })
    }

    async fn unique_confirmation_code(&self) -> Result<String, ServerError> {
        for _ in 0..CODE_RETRIES {
            let code = random_string(CONFIRMATION_CHARSET, CONFIRMATION_CODE_LEN);
            if !self.claims.confirmation_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(ServerError::Internal(anyhow::anyhow!(
            "no unique confirmation code after {CODE_RETRIES} attempts"
        )))
    }

    async fn notify_provider(&self, meal: &Meal, claim: &Claim) -> Result<(), ServerError> {
        self.notifications
            .create(&Notification {
                id: Uuid::now_v7(),
                account_id: meal.provider_id,
                channel: NotificationChannel::InApp,
                subject: "New claim on your meal".to_owned(),
                body: format!(
                    "{} portion(s) of \"{}\" reserved for pickup.",
                    claim.quantity, meal.name
                ),
                sent: true,
                error: None,
                meal_id: Some(meal.id),
                claim_id: Some(claim.id),
                read_at: None,
                created_at: Utc::now(),
            })
            .await
    }
}

pub struct ConfirmClaimUseCase<C, O>
where
    C: ClaimRepository,
    O: OtpRepository,
{
    pub claims: C,
    pub verifier: VerifyOtpUseCase<O>,
}

impl<C, O> ConfirmClaimUseCase<C, O>
where
    C: ClaimRepository,
    O: OtpRepository,
{
    pub async fn execute(
        &self,
        beneficiary_id: Uuid,
        claim_id: Uuid,
        code: &str,
    ) -> Result<Claim, ServerError> {
        // 1. Ownership by masking.
        let claim = self
            .claims
            .find_by_id(claim_id)
            .await?
            .ok_or(ServerError::ClaimNotFound)?;
        if claim.beneficiary_id != beneficiary_id {
            return Err(ServerError::ClaimNotFound);
        }

        // 2. State gate. Confirming twice is a no-op.
        match claim.status {
            ClaimStatus::Pending => {}
            ClaimStatus::Confirmed => return Ok(claim),
            ClaimStatus::Collected | ClaimStatus::Cancelled => {
                return Err(ServerError::InvalidTransition);
            }
        }

        // 3. Burn the collection code as the confirmation proof.
        self.verifier
            .execute(beneficiary_id, OtpPurpose::Collection, code)
            .await?;

        let now = Utc::now();
        if !self.claims.mark_confirmed(claim.id, now).await? {
            // Lost a race: the claim left pending between the read and the
            // guarded update. Report from the current row.
            let current = self
                .claims
                .find_by_id(claim.id)
                .await?
                .ok_or(ServerError::ClaimNotFound)?;
            return match current.status {
                ClaimStatus::Confirmed => Ok(current),
                _ => Err(ServerError::InvalidTransition),
            };
        }
        Ok(Claim {
            status: ClaimStatus::Confirmed,
            updated_at: now,
            ..claim
        })
    }
}

pub struct VerifyCollectionUseCase<C, M, O, N>
where
    C: ClaimRepository,
    M: MealRepository,
    O: OtpRepository,
    N: NotificationRepository,
{
    pub claims: C,
    pub meals: M,
    pub verifier: VerifyOtpUseCase<O>,
    pub notifications: N,
}

impl<C, M, O, N> VerifyCollectionUseCase<C, M, O, N>
where
    C: ClaimRepository,
    M: MealRepository,
    O: OtpRepository,
    N: NotificationRepository,
{
    pub async fn execute(
        &self,
        provider_id: Uuid,
        claim_id: Uuid,
        code: &str,
    ) -> Result<Claim, ServerError> {
        // 1. Ownership runs through the meal's provider.
        let claim = self
            .claims
            .find_by_id(claim_id)
            .await?
            .ok_or(ServerError::ClaimNotFound)?;
        let meal = self
            .meals
            .find_by_id(claim.meal_id)
            .await?
            .ok_or(ServerError::ClaimNotFound)?;
        if meal.provider_id != provider_id {
            return Err(ServerError::ClaimNotFound);
        }

        // 2. State gate.
        match claim.status {
            ClaimStatus::Collected => return Err(ServerError::AlreadyCollected),
            ClaimStatus::Cancelled => return Err(ServerError::ClaimCancelled),
            ClaimStatus::Pending | ClaimStatus::Confirmed => {}
        }

        // 3. The confirmation code is the primary credential; the
        //    beneficiary's collection OTP is accepted as a fallback.
        if claim.confirmation_code != code {
            match self
                .verifier
                .execute(claim.beneficiary_id, OtpPurpose::Collection, code)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_auth_failure() => return Err(ServerError::CodeMismatch),
                Err(e) => return Err(e),
            }
        }

        // 4. Exactly-once transition; a lost race reads as already done.
        let now = Utc::now();
        if !self.claims.mark_collected(claim.id, now).await? {
            return Err(ServerError::AlreadyCollected);
        }
        self.notify_beneficiary(&meal, &claim).await?;

        Ok(Claim {
            status: ClaimStatus::Collected,
            collected_at: Some(now),
            updated_at: now,
            ..claim
        })
    }

    async fn notify_beneficiary(&self, meal: &Meal, claim: &Claim) -> Result<(), ServerError> {
        self.notifications
            .create(&Notification {
                id: Uuid::now_v7(),
                account_id: claim.beneficiary_id,
                channel: NotificationChannel::InApp,
                subject: "Pickup confirmed".to_owned(),
                body: format!("Your pickup of \"{}\" is confirmed. Enjoy!", meal.name),
                sent: true,
                error: None,
                meal_id: Some(meal.id),
                claim_id: Some(claim.id),
                read_at: None,
                created_at: Utc::now(),
            })
            .await
    }
}

pub struct CancelClaimUseCase<C, M>
where
    C: ClaimRepository,
    M: MealRepository,
{
    pub claims: C,
    pub meals: M,
}

impl<C, M> CancelClaimUseCase<C, M>
where
    C: ClaimRepository,
    M: MealRepository,
{
    pub async fn execute(&self, caller_id: Uuid, claim_id: Uuid) -> Result<Claim, ServerError> {
        // 1. The beneficiary or the meal's provider may cancel; everyone
        //    else sees a missing claim.
        let claim = self
            .claims
            .find_by_id(claim_id)
            .await?
            .ok_or(ServerError::ClaimNotFound)?;
        let meal = self
            .meals
            .find_by_id(claim.meal_id)
            .await?
            .ok_or(ServerError::ClaimNotFound)?;
        if caller_id != claim.beneficiary_id && caller_id != meal.provider_id {
            return Err(ServerError::ClaimNotFound);
        }

        // 2. Collected portions are gone for good; repeat cancels no-op.
        match claim.status {
            ClaimStatus::Cancelled => return Ok(claim),
            ClaimStatus::Collected => return Err(ServerError::InvalidTransition),
            ClaimStatus::Pending | ClaimStatus::Confirmed => {}
        }

        // 3. Cancel and hand the portions back in one transaction. Losing
        //    a race against the pickup surfaces as the transition error.
        let now = Utc::now();
        if !self.claims.cancel_and_restore(&claim, now).await? {
            return Err(ServerError::InvalidTransition);
        }
        Ok(Claim {
            status: ClaimStatus::Cancelled,
            updated_at: now,
            ..claim
        })
    }
}

pub struct ListClaimsUseCase<C: ClaimRepository> {
    pub claims: C,
}

impl<C: ClaimRepository> ListClaimsUseCase<C> {
    /// Beneficiaries see their own claims, providers the claims against
    /// their meals.
    pub async fn execute(
        &self,
        account_id: Uuid,
        role: AccountRole,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError> {
        let page = page.clamped();
        match role {
            AccountRole::Beneficiary => self.claims.list_for_beneficiary(account_id, page).await,
            AccountRole::Provider => self.claims.list_for_provider(account_id, page).await,
        }
    }
}
