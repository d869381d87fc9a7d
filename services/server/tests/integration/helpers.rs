use std::cmp::Reverse;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::geo::GeoPoint;
use mealdrop_domain::pagination::PageRequest;
use mealdrop_server::config::OtpConfig;
use mealdrop_server::domain::repository::{
    AccountRepository, ClaimRepository, DispatchError, DispatchPort, MealFilter, MealRepository,
    NotificationRepository, OtpRepository, ReserveOutcome, SessionRepository,
};
use mealdrop_server::domain::types::{
    Account, Claim, ClaimStatus, Meal, MealType, Notification, NotificationChannel, OtpPurpose,
    OtpRecord, Session,
};
use mealdrop_server::error::ServerError;
use mealdrop_server::usecase::otp::{IssueOtpUseCase, VerifyOtpUseCase};

// ── MockStore ────────────────────────────────────────────────────────────────

/// In-memory stand-in for every persistence port. Clones share the same
/// tables, so one store can be handed to several usecases in a test and
/// what one writes the others see.
#[derive(Clone, Default)]
pub struct MockStore {
    pub accounts: Arc<Mutex<Vec<Account>>>,
    pub otp_codes: Arc<Mutex<Vec<OtpRecord>>>,
    pub sessions: Arc<Mutex<Vec<Session>>>,
    pub meals: Arc<Mutex<Vec<Meal>>>,
    pub claims: Arc<Mutex<Vec<Claim>>>,
    pub notifications: Arc<Mutex<Vec<Notification>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_account(&self, account: Account) -> Account {
        self.accounts.lock().unwrap().push(account.clone());
        account
    }

    pub fn seed_meal(&self, meal: Meal) -> Meal {
        self.meals.lock().unwrap().push(meal.clone());
        meal
    }

    pub fn seed_claim(&self, claim: Claim) -> Claim {
        self.claims.lock().unwrap().push(claim.clone());
        claim
    }

    pub fn seed_notification(&self, notification: Notification) -> Notification {
        self.notifications.lock().unwrap().push(notification.clone());
        notification
    }

    /// Code on the newest record for the pair, for driving the second
    /// phase of a flow the way a client reading their SMS would.
    pub fn latest_otp_code(&self, account_id: Uuid, purpose: OtpPurpose) -> String {
        self.otp_codes
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.account_id == account_id && r.purpose == purpose)
            .max_by_key(|r| r.created_at)
            .map(|r| r.code.clone())
            .expect("no code was issued for this account and purpose")
    }

    pub fn issuer(&self, dispatch: MockDispatch) -> IssueOtpUseCase<Self, Self, MockDispatch> {
        self.issuer_with(OtpConfig::default(), dispatch)
    }

    pub fn issuer_with(
        &self,
        config: OtpConfig,
        dispatch: MockDispatch,
    ) -> IssueOtpUseCase<Self, Self, MockDispatch> {
        IssueOtpUseCase {
            otp_codes: self.clone(),
            notifications: self.clone(),
            dispatch,
            config,
        }
    }

    pub fn verifier(&self) -> VerifyOtpUseCase<Self> {
        VerifyOtpUseCase {
            otp_codes: self.clone(),
            config: OtpConfig::default(),
        }
    }
}

impl AccountRepository for MockStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, ServerError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServerError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn username_taken(&self, username: &str) -> Result<bool, ServerError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .any(|a| a.username == username))
    }

    async fn email_taken(&self, email: &str) -> Result<bool, ServerError> {
        Ok(self.accounts.lock().unwrap().iter().any(|a| a.email == email))
    }

    async fn phone_taken(&self, phone: &str) -> Result<bool, ServerError> {
        Ok(self.accounts.lock().unwrap().iter().any(|a| a.phone == phone))
    }

    async fn create(&self, account: &Account) -> Result<(), ServerError> {
        self.accounts.lock().unwrap().push(account.clone());
        Ok(())
    }

    async fn mark_phone_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let mut rows = self.accounts.lock().unwrap();
        if let Some(a) = rows.iter_mut().find(|a| a.id == id) {
            a.phone_verified = true;
            a.updated_at = now;
        }
        Ok(())
    }
}

impl OtpRepository for MockStore {
    async fn find_latest(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, ServerError> {
        Ok(self
            .otp_codes
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.account_id == account_id && r.purpose == purpose)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn expire_active(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError> {
        let mut rows = self.otp_codes.lock().unwrap();
        let mut retired = 0;
        for r in rows.iter_mut().filter(|r| {
            r.account_id == account_id
                && r.purpose == purpose
                && r.verified_at.is_none()
                && !r.is_expired_at(now)
        }) {
            r.expires_at = now;
            retired += 1;
        }
        Ok(retired)
    }

    async fn create(&self, record: &OtpRecord) -> Result<(), ServerError> {
        self.otp_codes.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn consume_attempt(&self, id: Uuid, cap: i32) -> Result<bool, ServerError> {
        let mut rows = self.otp_codes.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        if row.verified_at.is_some() || row.attempts >= cap {
            return Ok(false);
        }
        row.attempts += 1;
        Ok(true)
    }

    async fn mark_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let mut rows = self.otp_codes.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        if row.verified_at.is_some() {
            return Ok(false);
        }
        row.verified_at = Some(now);
        Ok(true)
    }
}

impl SessionRepository for MockStore {
    async fn create(&self, session: &Session) -> Result<(), ServerError> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, ServerError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.token == token && s.is_active_at(now))
            .cloned())
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let mut rows = self.sessions.lock().unwrap();
        if let Some(s) = rows.iter_mut().find(|s| s.id == id) {
            if s.revoked_at.is_none() {
                s.revoked_at = Some(now);
            }
        }
        Ok(())
    }
}

impl MealRepository for MockStore {
    async fn create(&self, meal: &Meal) -> Result<(), ServerError> {
        self.meals.lock().unwrap().push(meal.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meal>, ServerError> {
        Ok(self.meals.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn list(&self, filter: &MealFilter, page: PageRequest) -> Result<Vec<Meal>, ServerError> {
        let page = page.clamped();
        let now = Utc::now();
        let mut rows: Vec<Meal> = self
            .meals
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !filter.claimable_only || m.is_claimable_at(now))
            .filter(|m| filter.meal_type.is_none_or(|t| m.meal_type == t))
            .filter(|m| filter.provider_id.is_none_or(|p| m.provider_id == p))
            .cloned()
            .collect();
        rows.sort_by_key(|m| Reverse(m.created_at));
        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn list_claimable_near(
        &self,
        _origin: GeoPoint,
        meal_type: Option<MealType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meal>, ServerError> {
        // Candidate set only; callers run the exact distance check.
        Ok(self
            .meals
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.is_claimable_at(now))
            .filter(|m| meal_type.is_none_or(|t| m.meal_type == t))
            .cloned()
            .collect())
    }

    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let mut rows = self.meals.lock().unwrap();
        if let Some(m) = rows.iter_mut().find(|m| m.id == id) {
            m.active = false;
            m.updated_at = now;
        }
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, ServerError> {
        let mut rows = self.meals.lock().unwrap();
        let mut retired = 0;
        for m in rows
            .iter_mut()
            .filter(|m| !m.expired && (m.serving_at <= now || m.remaining_quantity <= 0))
        {
            m.expired = true;
            m.updated_at = now;
            retired += 1;
        }
        Ok(retired)
    }

    async fn count_by_provider(&self, provider_id: Uuid) -> Result<u64, ServerError> {
        Ok(self
            .meals
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.provider_id == provider_id)
            .count() as u64)
    }

    async fn count_claimable_by_provider(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError> {
        Ok(self
            .meals
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.provider_id == provider_id && m.is_claimable_at(now))
            .count() as u64)
    }
}

// Lock order is meals before claims in every method that takes both, which
// keeps the reservation and the restore genuinely atomic to each other.
impl ClaimRepository for MockStore {
    async fn create(&self, claim: &Claim, now: DateTime<Utc>) -> Result<ReserveOutcome, ServerError> {
        let mut meals = self.meals.lock().unwrap();
        let mut claims = self.claims.lock().unwrap();
        let Some(meal) = meals.iter_mut().find(|m| m.id == claim.meal_id) else {
            return Ok(ReserveOutcome::MealMissing);
        };
        if !(meal.active && !meal.expired && meal.serving_at > now) {
            return Ok(ReserveOutcome::NotClaimable);
        }
        if meal.remaining_quantity < claim.quantity {
            return Ok(ReserveOutcome::InsufficientQuantity);
        }
        meal.remaining_quantity -= claim.quantity;
        meal.updated_at = now;
        claims.push(claim.clone());
        Ok(ReserveOutcome::Reserved)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Claim>, ServerError> {
        Ok(self.claims.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn find_open_for(
        &self,
        meal_id: Uuid,
        beneficiary_id: Uuid,
    ) -> Result<Option<Claim>, ServerError> {
        Ok(self
            .claims
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.meal_id == meal_id && c.beneficiary_id == beneficiary_id && c.status.is_open()
            })
            .cloned())
    }

    async fn confirmation_code_exists(&self, code: &str) -> Result<bool, ServerError> {
        Ok(self
            .claims
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.confirmation_code == code))
    }

    async fn mark_confirmed(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let mut rows = self.claims.lock().unwrap();
        let Some(c) = rows
            .iter_mut()
            .find(|c| c.id == id && c.status == ClaimStatus::Pending)
        else {
            return Ok(false);
        };
        c.status = ClaimStatus::Confirmed;
        c.updated_at = now;
        Ok(true)
    }

    async fn mark_collected(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let mut rows = self.claims.lock().unwrap();
        let Some(c) = rows.iter_mut().find(|c| c.id == id && c.status.is_open()) else {
            return Ok(false);
        };
        c.status = ClaimStatus::Collected;
        c.collected_at = Some(now);
        c.updated_at = now;
        Ok(true)
    }

    async fn cancel_and_restore(
        &self,
        claim: &Claim,
        now: DateTime<Utc>,
    ) -> Result<bool, ServerError> {
        let mut meals = self.meals.lock().unwrap();
        let mut claims = self.claims.lock().unwrap();
        let Some(row) = claims
            .iter_mut()
            .find(|c| c.id == claim.id && c.status.is_open())
        else {
            return Ok(false);
        };
        row.status = ClaimStatus::Cancelled;
        row.updated_at = now;
        if let Some(meal) = meals.iter_mut().find(|m| m.id == row.meal_id) {
            meal.remaining_quantity += row.quantity;
            if meal.expired && meal.serving_at > now {
                meal.expired = false;
            }
            meal.updated_at = now;
        }
        Ok(true)
    }

    async fn list_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError> {
        let page = page.clamped();
        let mut rows: Vec<Claim> = self
            .claims
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.beneficiary_id == beneficiary_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| Reverse(c.created_at));
        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Claim>, ServerError> {
        let page = page.clamped();
        let meals = self.meals.lock().unwrap();
        let claims = self.claims.lock().unwrap();
        let owned: Vec<Uuid> = meals
            .iter()
            .filter(|m| m.provider_id == provider_id)
            .map(|m| m.id)
            .collect();
        let mut rows: Vec<Claim> = claims
            .iter()
            .filter(|c| owned.contains(&c.meal_id))
            .cloned()
            .collect();
        rows.sort_by_key(|c| Reverse(c.created_at));
        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn count_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
        status: Option<ClaimStatus>,
    ) -> Result<u64, ServerError> {
        Ok(self
            .claims
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.beneficiary_id == beneficiary_id)
            .filter(|c| status.is_none_or(|s| c.status == s))
            .count() as u64)
    }

    async fn count_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<ClaimStatus>,
    ) -> Result<u64, ServerError> {
        let meals = self.meals.lock().unwrap();
        let claims = self.claims.lock().unwrap();
        let owned: Vec<Uuid> = meals
            .iter()
            .filter(|m| m.provider_id == provider_id)
            .map(|m| m.id)
            .collect();
        Ok(claims
            .iter()
            .filter(|c| owned.contains(&c.meal_id))
            .filter(|c| status.is_none_or(|s| c.status == s))
            .count() as u64)
    }
}

impl NotificationRepository for MockStore {
    async fn create(&self, notification: &Notification) -> Result<(), ServerError> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, ServerError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn list_for_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ServerError> {
        let page = page.clamped();
        let mut rows: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by_key(|n| Reverse(n.created_at));
        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn mark_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServerError> {
        let mut rows = self.notifications.lock().unwrap();
        if let Some(n) = rows.iter_mut().find(|n| n.id == id) {
            if n.read_at.is_none() {
                n.read_at = Some(now);
            }
        }
        Ok(())
    }

    async fn mark_all_read(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ServerError> {
        let mut rows = self.notifications.lock().unwrap();
        let mut updated = 0;
        for n in rows
            .iter_mut()
            .filter(|n| n.account_id == account_id && n.read_at.is_none())
        {
            n.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }
}

// ── MockDispatch ─────────────────────────────────────────────────────────────

/// Outbound channel stub. The failure switches force the SMS-to-email
/// fallback; every accepted send lands in `sent` as (channel, text).
#[derive(Clone, Default)]
pub struct MockDispatch {
    pub fail_sms: bool,
    pub fail_email: bool,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockDispatch {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn sms_down() -> Self {
        Self {
            fail_sms: true,
            ..Self::default()
        }
    }

    pub fn all_down() -> Self {
        Self {
            fail_sms: true,
            fail_email: true,
            ..Self::default()
        }
    }

    /// Shared handle to the outbox for post-execution inspection.
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.sent)
    }
}

impl DispatchPort for MockDispatch {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<(), DispatchError> {
        if self.fail_sms {
            return Err(DispatchError("sms gateway unreachable".to_owned()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(("sms".to_owned(), format!("{phone}: {body}")));
        Ok(())
    }

    async fn send_email(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        if self.fail_email {
            return Err(DispatchError("mail gateway unreachable".to_owned()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(("email".to_owned(), format!("{address}: {subject}: {body}")));
        Ok(())
    }
}

// ── Test fixture helpers ─────────────────────────────────────────────────────

static SEQ: AtomicU32 = AtomicU32::new(0);

/// Bcrypt at the minimum cost; tests only need hashes that verify.
pub fn test_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

pub fn test_account(username: &str, role: AccountRole) -> Account {
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let now = Utc::now();
    Account {
        id: Uuid::new_v4(),
        username: username.to_owned(),
        email: format!("{username}@example.com"),
        phone: format!("+4420794{seq:05}"),
        password_hash: test_hash(TEST_PASSWORD),
        role,
        address: None,
        phone_verified: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn unverified_account(username: &str, role: AccountRole) -> Account {
    Account {
        phone_verified: false,
        ..test_account(username, role)
    }
}

pub fn test_session(account: &Account) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4(),
        account_id: account.id,
        token: format!("tok-{}", account.id.simple()),
        role: account.role,
        ip: None,
        user_agent: None,
        expires_at: now + Duration::hours(1),
        revoked_at: None,
        created_at: now,
    }
}

/// Claimable dinner for ten, served in two hours, centered on the given
/// point with the default five kilometre radius.
pub fn test_meal(provider_id: Uuid, latitude: f64, longitude: f64) -> Meal {
    let now = Utc::now();
    Meal {
        id: Uuid::new_v4(),
        provider_id,
        name: "Lentil stew".to_owned(),
        description: Some("Freshly cooked, vegan".to_owned()),
        meal_type: MealType::Dinner,
        total_quantity: 10,
        remaining_quantity: 10,
        serving_at: now + Duration::hours(2),
        pickup_address: "12 Borough Market, London".to_owned(),
        location: GeoPoint::new(latitude, longitude),
        radius_km: 5.0,
        active: true,
        expired: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_claim(meal_id: Uuid, beneficiary_id: Uuid, quantity: i32) -> Claim {
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let now = Utc::now();
    Claim {
        id: Uuid::new_v4(),
        meal_id,
        beneficiary_id,
        quantity,
        status: ClaimStatus::Pending,
        confirmation_code: format!("CODE{seq:04}"),
        collected_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_notification(account_id: Uuid, subject: &str) -> Notification {
    let now = Utc::now();
    Notification {
        id: Uuid::new_v4(),
        account_id,
        channel: NotificationChannel::InApp,
        subject: subject.to_owned(),
        body: format!("{subject}."),
        sent: true,
        error: None,
        meal_id: None,
        claim_id: None,
        read_at: None,
        created_at: now,
    }
}

pub const TEST_PASSWORD: &str = "sunflower-42";

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// One row of `tests/fixtures/meals.json`. Serving times are stored as
/// offsets so the map stays valid whenever the suite runs.
#[derive(Debug, Deserialize)]
pub struct MealFixture {
    pub name: String,
    pub meal_type: String,
    pub quantity: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub serving_in_mins: i64,
}

pub fn load_meal_fixtures() -> Vec<MealFixture> {
    serde_json::from_str(include_str!("../fixtures/meals.json"))
        .expect("meals fixture must parse")
}

pub fn meal_from_fixture(provider_id: Uuid, fixture: &MealFixture) -> Meal {
    let now = Utc::now();
    Meal {
        id: Uuid::new_v4(),
        provider_id,
        name: fixture.name.clone(),
        description: None,
        meal_type: MealType::parse(&fixture.meal_type).expect("fixture meal type"),
        total_quantity: fixture.quantity,
        remaining_quantity: fixture.quantity,
        serving_at: now + Duration::minutes(fixture.serving_in_mins),
        pickup_address: format!("{}, collection point", fixture.name),
        location: GeoPoint::new(fixture.latitude, fixture.longitude),
        radius_km: fixture.radius_km,
        active: true,
        expired: false,
        created_at: now,
        updated_at: now,
    }
}
