use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Query},
};
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::geo::{GeoPoint, KM_PER_DEGREE_LAT};
use mealdrop_domain::pagination::PageRequest;
use mealdrop_server_schema::{accounts, claims, meals, notifications, otp_codes, sessions};

use crate::domain::repository::{
    AccountRepository, ClaimRepository, MealFilter, MealRepository, NotificationRepository,
    OtpRepository, ReserveOutcome, SessionRepository,
};
use crate::domain::types::{
    Account, Claim, ClaimStatus, Meal, MealType, Notification, NotificationChannel, OtpPurpose,
    OtpRecord, Session,
};
use crate::error::ServerError;

// ── Account repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAccountRepository {
    pub db: Arc<DatabaseConnection>,
}

impl AccountRepository for DbAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, ServerError> {
        let model = accounts::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .context("find account by id")?;
        model.map(account_from_model).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServerError> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .context("find account by username")?;
        model.map(account_from_model).transpose()
    }

    async fn username_taken(&self, username: &str) -> Result<bool, ServerError> {
        use sea_orm::PaginatorTrait;
        let count = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .count(self.db.as_ref())
            .await
            .context("count accounts by username")?;
        Ok(count > 0)
    }

    async fn email_taken(&self, email: &str) -> Result<bool, ServerError> {
        use sea_orm::PaginatorTrait;
        let count = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .count(self.db.as_ref())
            .await
            .context("count accounts by email")?;
        Ok(count > 0)
    }

    async fn phone_taken(&self, phone: &str) -> Result<bool, ServerError> {
        use sea_orm::PaginatorTrait;
        let count = accounts::Entity::find()
            .filter(accounts::Column::Phone.eq(phone))
            .count(self.db.as_ref())
            .await
            .context("count accounts by phone")?;
        Ok(count > 0)
    }

    async fn create(&self, account: &Account) -> Result<(), ServerError> {
        accounts::ActiveModel {
            id: Set(account.id),
            username: Set(account.username.clone()),
            email: Set(account.email.clone()),
            phone: Set(account.phone.clone()),
            password_hash: Set(account.password_hash.clone()),
            role: Set(account.role.as_i16()),
            address: Set(account.address.clone()),
            phone_verified: Set(account.phone_verified),
            created_at: Set(account.created_at),
            updated_at: Set(account.updated_at),
        }
        .insert(self.db.as_ref())
        .await
        .context("insert account")?;
        Ok(())
    }

    async fn mark_phone_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let _ = accounts::Entity::update_many()
            .col_expr(accounts::Column::PhoneVerified, Expr::value(true))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .context("mark phone verified")?;
        Ok(())
    }
}

// ── One-time-code repository ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOtpRepository {
    pub db: Arc<DatabaseConnection>,
}

impl OtpRepository for DbOtpRepository {
    async fn find_latest(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, ServerError> {
        let model = otp_codes::Entity::find()
            .filter(otp_codes::Column::AccountId.eq(account_id))
            .filter(otp_codes::Column::Purpose.eq(purpose.as_i16()))
            .order_by_desc(otp_codes::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .context("find latest otp code")?;
        model.map(otp_from_model).transpose()
    }

    async fn expire_active(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError> {
        let res = otp_codes::Entity::update_many()
            .col_expr(otp_codes::Column::ExpiresAt, Expr::value(now))
            .filter(otp_codes::Column::AccountId.eq(account_id))
            .filter(otp_codes::Column::Purpose.eq(purpose.as_i16()))
            .filter(otp_codes::Column::VerifiedAt.is_null())
            .filter(otp_codes::Column::ExpiresAt.gt(now))
            .exec(self.db.as_ref())
            .await
            .context("expire active otp codes")?;
        Ok(res.rows_affected)
    }

    async fn create(&self, record: &OtpRecord) -> Result<(), ServerError> {
        otp_codes::ActiveModel {
            id: Set(record.id),
            account_id: Set(record.account_id),
            code: Set(record.code.clone()),
            purpose: Set(record.purpose.as_i16()),
            attempts: Set(record.attempts),
            expires_at: Set(record.expires_at),
            verified_at: Set(record.verified_at),
            created_at: Set(record.created_at),
        }
        .insert(self.db.as_ref())
        .await
        .context("insert otp code")?;
        Ok(())
    }

    async fn consume_attempt(&self, id: Uuid, cap: i32) -> Result<bool, ServerError> {
        // Guarded increment: the row refuses the submission once `cap`
        // slots are used, no matter how many verifiers race.
        let res = otp_codes::Entity::update_many()
            .col_expr(
                otp_codes::Column::Attempts,
                Expr::col(otp_codes::Column::Attempts).add(1),
            )
            .filter(otp_codes::Column::Id.eq(id))
            .filter(otp_codes::Column::VerifiedAt.is_null())
            .filter(otp_codes::Column::Attempts.lt(cap))
            .exec(self.db.as_ref())
            .await
            .context("consume otp attempt")?;
        Ok(res.rows_affected > 0)
    }

    async fn mark_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let res = otp_codes::Entity::update_many()
            .col_expr(otp_codes::Column::VerifiedAt, Expr::value(now))
            .filter(otp_codes::Column::Id.eq(id))
            .filter(otp_codes::Column::VerifiedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .context("mark otp verified")?;
        Ok(res.rows_affected > 0)
    }
}

// ── Session repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSessionRepository {
    pub db: Arc<DatabaseConnection>,
}

impl SessionRepository for DbSessionRepository {
    async fn create(&self, session: &Session) -> Result<(), ServerError> {
        sessions::ActiveModel {
            id: Set(session.id),
            account_id: Set(session.account_id),
            token: Set(session.token.clone()),
            role: Set(session.role.as_i16()),
            ip: Set(session.ip.clone()),
            user_agent: Set(session.user_agent.clone()),
            expires_at: Set(session.expires_at),
            revoked_at: Set(session.revoked_at),
            created_at: Set(session.created_at),
        }
        .insert(self.db.as_ref())
        .await
        .context("insert session")?;
        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, ServerError> {
        let model = sessions::Entity::find()
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::RevokedAt.is_null())
            .filter(sessions::Column::ExpiresAt.gt(now))
            .one(self.db.as_ref())
            .await
            .context("find active session")?;
        model.map(session_from_model).transpose()
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let _ = sessions::Entity::update_many()
            .col_expr(sessions::Column::RevokedAt, Expr::value(now))
            .filter(sessions::Column::Id.eq(id))
            .filter(sessions::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .context("revoke session")?;
        Ok(())
    }
}

// ── Meal repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbMealRepository {
    pub db: Arc<DatabaseConnection>,
}

impl MealRepository for DbMealRepository {
    async fn create(&self, meal: &Meal) -> Result<(), ServerError> {
        meals::ActiveModel {
            id: Set(meal.id),
            provider_id: Set(meal.provider_id),
            name: Set(meal.name.clone()),
            description: Set(meal.description.clone()),
            meal_type: Set(meal.meal_type.as_i16()),
            total_quantity: Set(meal.total_quantity),
            remaining_quantity: Set(meal.remaining_quantity),
            serving_at: Set(meal.serving_at),
            pickup_address: Set(meal.pickup_address.clone()),
            latitude: Set(meal.location.latitude),
            longitude: Set(meal.location.longitude),
            radius_km: Set(meal.radius_km),
            active: Set(meal.active),
            expired: Set(meal.expired),
            created_at: Set(meal.created_at),
            updated_at: Set(meal.updated_at),
        }
        .insert(self.db.as_ref())
        .await
        .context("insert meal")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meal>, ServerError> {
        let model = meals::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .context("find meal by id")?;
        model.map(meal_from_model).transpose()
    }

    async fn list(
        &self,
        filter: &MealFilter,
        page: PageRequest,
    ) -> Result<Vec<Meal>, ServerError> {
        let page = page.clamped();
        let mut query = meals::Entity::find();
        if filter.claimable_only {
            let now = Utc::now();
            query = query
                .filter(meals::Column::Active.eq(true))
                .filter(meals::Column::Expired.eq(false))
                .filter(meals::Column::RemainingQuantity.gt(0))
                .filter(meals::Column::ServingAt.gt(now));
        }
        if let Some(meal_type) = filter.meal_type {
            query = query.filter(meals::Column::MealType.eq(meal_type.as_i16()));
        }
        if let Some(provider_id) = filter.provider_id {
            query = query.filter(meals::Column::ProviderId.eq(provider_id));
        }
        let models = query
            .order_by_desc(meals::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.db.as_ref())
            .await
            .context("list meals")?;
        models.into_iter().map(meal_from_model).collect()
    }

    async fn list_claimable_near(
        &self,
        origin: GeoPoint,
        meal_type: Option<MealType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meal>, ServerError> {
        use sea_orm::Statement;

        // Per-meal bounding box: a meal is a candidate when the origin sits
        // inside the square its own radius spans. Longitude degrees shrink
        // by cos(latitude); GREATEST keeps the divisor sane near the poles.
        // Callers still run the exact haversine check over the candidates.
        let sql = format!(
            r#"
            SELECT * FROM meals
            WHERE active = TRUE
              AND expired = FALSE
              AND remaining_quantity > 0
              AND serving_at > $1
              AND ($2::int2 IS NULL OR meal_type = $2)
              AND ABS(latitude - $3) <= radius_km / {km_per_deg}
              AND ABS(longitude - $4) <= radius_km / ({km_per_deg} * GREATEST(COS(RADIANS($3)), 0.01))
            "#,
            km_per_deg = KM_PER_DEGREE_LAT,
        );

        let models = meals::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                self.db.get_database_backend(),
                &sql,
                [
                    now.into(),
                    meal_type.map(|t| t.as_i16()).into(),
                    origin.latitude.into(),
                    origin.longitude.into(),
                ],
            ))
            .all(self.db.as_ref())
            .await
            .context("list claimable meals near origin")?;
        models.into_iter().map(meal_from_model).collect()
    }

    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let _ = meals::Entity::update_many()
            .col_expr(meals::Column::Active, Expr::value(false))
            .col_expr(meals::Column::UpdatedAt, Expr::value(now))
            .filter(meals::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .context("deactivate meal")?;
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, ServerError> {
        let res = meals::Entity::update_many()
            .col_expr(meals::Column::Expired, Expr::value(true))
            .col_expr(meals::Column::UpdatedAt, Expr::value(now))
            .filter(meals::Column::Expired.eq(false))
            .filter(
                Condition::any()
                    .add(meals::Column::ServingAt.lte(now))
                    .add(meals::Column::RemainingQuantity.lte(0)),
            )
            .exec(self.db.as_ref())
            .await
            .context("sweep expired meals")?;
        Ok(res.rows_affected)
    }

    async fn count_by_provider(&self, provider_id: Uuid) -> Result<u64, ServerError> {
        use sea_orm::PaginatorTrait;
        let count = meals::Entity::find()
            .filter(meals::Column::ProviderId.eq(provider_id))
            .count(self.db.as_ref())
            .await
            .context("count meals by provider")?;
        Ok(count)
    }

    async fn count_claimable_by_provider(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError> {
        use sea_orm::PaginatorTrait;
        let count = meals::Entity::find()
            .filter(meals::Column::ProviderId.eq(provider_id))
            .filter(meals::Column::Active.eq(true))
            .filter(meals::Column::Expired.eq(false))
            .filter(meals::Column::RemainingQuantity.gt(0))
            .filter(meals::Column::ServingAt.gt(now))
            .count(self.db.as_ref())
            .await
            .context("count claimable meals by provider")?;
        Ok(count)
    }
}

// ── Claim repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbClaimRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ClaimRepository for DbClaimRepository {
    async fn create(
        &self,
        claim: &Claim,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, ServerError> {
        let outcome = self
            .db
            .transaction::<_, ReserveOutcome, sea_orm::DbErr>(|txn| {
                let claim = claim.clone();
                Box::pin(async move {
                    // Reserve quantity first. All claimability conditions sit
                    // in the WHERE clause, so two racing claims can never
                    // drive remaining_quantity below zero.
                    let reserved = meals::Entity::update_many()
                        .col_expr(
                            meals::Column::RemainingQuantity,
                            Expr::col(meals::Column::RemainingQuantity).sub(claim.quantity),
                        )
                        .col_expr(meals::Column::UpdatedAt, Expr::value(now))
                        .filter(meals::Column::Id.eq(claim.meal_id))
                        .filter(meals::Column::Active.eq(true))
                        .filter(meals::Column::Expired.eq(false))
                        .filter(meals::Column::ServingAt.gt(now))
                        .filter(meals::Column::RemainingQuantity.gte(claim.quantity))
                        .exec(txn)
                        .await?;

                    if reserved.rows_affected == 0 {
                        // Nothing written; look at the meal to say why.
                        let meal = meals::Entity::find_by_id(claim.meal_id).one(txn).await?;
                        return Ok(match meal {
                            None => ReserveOutcome::MealMissing,
                            Some(m)
                                if m.active
                                    && !m.expired
                                    && m.serving_at > now
                                    && m.remaining_quantity < claim.quantity =>
                            {
                                ReserveOutcome::InsufficientQuantity
                            }
                            Some(_) => ReserveOutcome::NotClaimable,
                        });
                    }

                    claims::ActiveModel {
                        id: Set(claim.id),
                        meal_id: Set(claim.meal_id),
                        beneficiary_id: Set(claim.beneficiary_id),
                        quantity: Set(claim.quantity),
                        status: Set(claim.status.as_i16()),
                        confirmation_code: Set(claim.confirmation_code.clone()),
                        collected_at: Set(claim.collected_at),
                        created_at: Set(claim.created_at),
                        updated_at: Set(claim.updated_at),
                    }
                    .insert(txn)
                    .await?;

                    Ok(ReserveOutcome::Reserved)
                })
            })
            .await
            .context("create claim")?;
        Ok(outcome)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Claim>, ServerError> {
        let model = claims::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .context("find claim by id")?;
        model.map(claim_from_model).transpose()
    }

    async fn find_open_for(
        &self,
        meal_id: Uuid,
        beneficiary_id: Uuid,
    ) -> Result<Option<Claim>, ServerError> {
        let model = claims::Entity::find()
            .filter(claims::Column::MealId.eq(meal_id))
            .filter(claims::Column::BeneficiaryId.eq(beneficiary_id))
            .filter(claims::Column::Status.is_in(open_statuses()))
            .one(self.db.as_ref())
            .await
            .context("find open claim")?;
        model.map(claim_from_model).transpose()
    }

    async fn confirmation_code_exists(&self, code: &str) -> Result<bool, ServerError> {
        use sea_orm::PaginatorTrait;
        let count = claims::Entity::find()
            .filter(claims::Column::ConfirmationCode.eq(code))
            .count(self.db.as_ref())
            .await
            .context("count claims by confirmation code")?;
        Ok(count > 0)
    }

    async fn mark_confirmed(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let res = claims::Entity::update_many()
            .col_expr(
                claims::Column::Status,
                Expr::value(ClaimStatus::Confirmed.as_i16()),
            )
            .col_expr(claims::Column::UpdatedAt, Expr::value(now))
            .filter(claims::Column::Id.eq(id))
            .filter(claims::Column::Status.eq(ClaimStatus::Pending.as_i16()))
            .exec(self.db.as_ref())
            .await
            .context("mark claim confirmed")?;
        Ok(res.rows_affected > 0)
    }

    async fn mark_collected(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let res = claims::Entity::update_many()
            .col_expr(
                claims::Column::Status,
                Expr::value(ClaimStatus::Collected.as_i16()),
            )
            .col_expr(claims::Column::CollectedAt, Expr::value(now))
            .col_expr(claims::Column::UpdatedAt, Expr::value(now))
            .filter(claims::Column::Id.eq(id))
            .filter(claims::Column::Status.is_in(open_statuses()))
            .exec(self.db.as_ref())
            .await
            .context("mark claim collected")?;
        Ok(res.rows_affected > 0)
    }

    async fn cancel_and_restore(
        &self,
        claim: &Claim,
        now: DateTime<Utc>,
    ) -> Result<bool, ServerError> {
        let cancelled = self
            .db
            .transaction::<_, bool, sea_orm::DbErr>(|txn| {
                let claim = claim.clone();
                Box::pin(async move {
                    let res = claims::Entity::update_many()
                        .col_expr(
                            claims::Column::Status,
                            Expr::value(ClaimStatus::Cancelled.as_i16()),
                        )
                        .col_expr(claims::Column::UpdatedAt, Expr::value(now))
                        .filter(claims::Column::Id.eq(claim.id))
                        .filter(claims::Column::Status.is_in(open_statuses()))
                        .exec(txn)
                        .await?;
                    if res.rows_affected == 0 {
                        return Ok(false);
                    }

                    let _ = meals::Entity::update_many()
                        .col_expr(
                            meals::Column::RemainingQuantity,
                            Expr::col(meals::Column::RemainingQuantity).add(claim.quantity),
                        )
                        .col_expr(meals::Column::UpdatedAt, Expr::value(now))
                        .filter(meals::Column::Id.eq(claim.meal_id))
                        .exec(txn)
                        .await?;

                    // Stock came back; a meal retired only for running out
                    // may list again, but a past serving time stays final.
                    let _ = meals::Entity::update_many()
                        .col_expr(meals::Column::Expired, Expr::value(false))
                        .filter(meals::Column::Id.eq(claim.meal_id))
                        .filter(meals::Column::Expired.eq(true))
                        .filter(meals::Column::ServingAt.gt(now))
                        .exec(txn)
                        .await?;

                    Ok(true)
                })
            })
            .await
            .context("cancel claim and restore quantity")?;
        Ok(cancelled)
    }

    async fn list_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError> {
        let page = page.clamped();
        let models = claims::Entity::find()
            .filter(claims::Column::BeneficiaryId.eq(beneficiary_id))
            .order_by_desc(claims::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.db.as_ref())
            .await
            .context("list claims for beneficiary")?;
        models.into_iter().map(claim_from_model).collect()
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError> {
        let page = page.clamped();
        let models = claims::Entity::find()
            .filter(claims::Column::MealId.in_subquery(provider_meal_ids(provider_id)))
            .order_by_desc(claims::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.db.as_ref())
            .await
            .context("list claims for provider")?;
        models.into_iter().map(claim_from_model).collect()
    }

    async fn count_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
        status: Option<ClaimStatus>,
    ) -> Result<u64, ServerError> {
        use sea_orm::PaginatorTrait;
        let mut query =
            claims::Entity::find().filter(claims::Column::BeneficiaryId.eq(beneficiary_id));
        if let Some(status) = status {
            query = query.filter(claims::Column::Status.eq(status.as_i16()));
        }
        let count = query
            .count(self.db.as_ref())
            .await
            .context("count claims for beneficiary")?;
        Ok(count)
    }

    async fn count_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<ClaimStatus>,
    ) -> Result<u64, ServerError> {
        use sea_orm::PaginatorTrait;
        let mut query = claims::Entity::find()
            .filter(claims::Column::MealId.in_subquery(provider_meal_ids(provider_id)));
        if let Some(status) = status {
            query = query.filter(claims::Column::Status.eq(status.as_i16()));
        }
        let count = query
            .count(self.db.as_ref())
            .await
            .context("count claims for provider")?;
        Ok(count)
    }
}

// ── Notification repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbNotificationRepository {
    pub db: Arc<DatabaseConnection>,
}

impl NotificationRepository for DbNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), ServerError> {
        notifications::ActiveModel {
            id: Set(notification.id),
            account_id: Set(notification.account_id),
            channel: Set(notification.channel.as_i16()),
            subject: Set(notification.subject.clone()),
            body: Set(notification.body.clone()),
            sent: Set(notification.sent),
            error: Set(notification.error.clone()),
            meal_id: Set(notification.meal_id),
            claim_id: Set(notification.claim_id),
            read_at: Set(notification.read_at),
            created_at: Set(notification.created_at),
        }
        .insert(self.db.as_ref())
        .await
        .context("insert notification")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, ServerError> {
        let model = notifications::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .context("find notification by id")?;
        model.map(notification_from_model).transpose()
    }

    async fn list_for_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ServerError> {
        let page = page.clamped();
        let models = notifications::Entity::find()
            .filter(notifications::Column::AccountId.eq(account_id))
            .order_by_desc(notifications::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.db.as_ref())
            .await
            .context("list notifications")?;
        models.into_iter().map(notification_from_model).collect()
    }

    async fn mark_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let _ = notifications::Entity::update_many()
            .col_expr(notifications::Column::ReadAt, Expr::value(now))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::ReadAt.is_null())
            .exec(self.db.as_ref())
            .await
            .context("mark notification read")?;
        Ok(())
    }

    async fn mark_all_read(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError> {
        let res = notifications::Entity::update_many()
            .col_expr(notifications::Column::ReadAt, Expr::value(now))
            .filter(notifications::Column::AccountId.eq(account_id))
            .filter(notifications::Column::ReadAt.is_null())
            .exec(self.db.as_ref())
            .await
            .context("mark all notifications read")?;
        Ok(res.rows_affected)
    }
}

// ── Model conversion ─────────────────────────────────────────────────────────

fn open_statuses() -> [i16; 2] {
    [
        ClaimStatus::Pending.as_i16(),
        ClaimStatus::Confirmed.as_i16(),
    ]
}

fn provider_meal_ids(provider_id: Uuid) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column(meals::Column::Id)
        .from(meals::Entity)
        .and_where(Expr::col(meals::Column::ProviderId).eq(provider_id))
        .to_owned()
}

fn account_from_model(model: accounts::Model) -> Result<Account, ServerError> {
    let role = AccountRole::from_i16(model.role)
        .ok_or_else(|| anyhow::anyhow!("account {} has invalid role {}", model.id, model.role))?;
    Ok(Account {
        id: model.id,
        username: model.username,
        email: model.email,
        phone: model.phone,
        password_hash: model.password_hash,
        role,
        address: model.address,
        phone_verified: model.phone_verified,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn otp_from_model(model: otp_codes::Model) -> Result<OtpRecord, ServerError> {
    let purpose = OtpPurpose::from_i16(model.purpose).ok_or_else(|| {
        anyhow::anyhow!("otp code {} has invalid purpose {}", model.id, model.purpose)
    })?;
    Ok(OtpRecord {
        id: model.id,
        account_id: model.account_id,
        code: model.code,
        purpose,
        attempts: model.attempts,
        expires_at: model.expires_at,
        verified_at: model.verified_at,
        created_at: model.created_at,
    })
}

fn session_from_model(model: sessions::Model) -> Result<Session, ServerError> {
    let role = AccountRole::from_i16(model.role)
        .ok_or_else(|| anyhow::anyhow!("session {} has invalid role {}", model.id, model.role))?;
    Ok(Session {
        id: model.id,
        account_id: model.account_id,
        token: model.token,
        role,
        ip: model.ip,
        user_agent: model.user_agent,
        expires_at: model.expires_at,
        revoked_at: model.revoked_at,
        created_at: model.created_at,
    })
}

fn meal_from_model(model: meals::Model) -> Result<Meal, ServerError> {
    let meal_type = MealType::from_i16(model.meal_type).ok_or_else(|| {
        anyhow::anyhow!("meal {} has invalid meal type {}", model.id, model.meal_type)
    })?;
    Ok(Meal {
        id: model.id,
        provider_id: model.provider_id,
        name: model.name,
        description: model.description,
        meal_type,
        total_quantity: model.total_quantity,
        remaining_quantity: model.remaining_quantity,
        serving_at: model.serving_at,
        pickup_address: model.pickup_address,
        location: GeoPoint::new(model.latitude, model.longitude),
        radius_km: model.radius_km,
        active: model.active,
        expired: model.expired,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn claim_from_model(model: claims::Model) -> Result<Claim, ServerError> {
    let status = ClaimStatus::from_i16(model.status).ok_or_else(|| {
        anyhow::anyhow!("claim {} has invalid status {}", model.id, model.status)
    })?;
    Ok(Claim {
        id: model.id,
        meal_id: model.meal_id,
        beneficiary_id: model.beneficiary_id,
        quantity: model.quantity,
        status,
        confirmation_code: model.confirmation_code,
        collected_at: model.collected_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn notification_from_model(model: notifications::Model) -> Result<Notification, ServerError> {
    let channel = NotificationChannel::from_i16(model.channel).ok_or_else(|| {
        anyhow::anyhow!(
            "notification {} has invalid channel {}",
            model.id,
            model.channel
        )
    })?;
    Ok(Notification {
        id: model.id,
        account_id: model.account_id,
        channel,
        subject: model.subject,
        body: model.body,
        sent: model.sent,
        error: model.error,
        meal_id: model.meal_id,
        claim_id: model.claim_id,
        read_at: model.read_at,
        created_at: model.created_at,
    })
}
