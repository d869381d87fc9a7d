//! Registration and the two-phase login gate.
//!
//! Phase one proves a password, phase two proves possession of the phone
//! (or inbox). A session row exists only after both phases pass.

use anyhow::Context as _;
use chrono::{Duration, Utc};
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;

use crate::domain::repository::{
    AccountRepository, DispatchPort, NotificationRepository, OtpRepository, SessionRepository,
};
use crate::domain::types::{
    Account, Notification, NotificationChannel, OtpPurpose, SESSION_TOKEN_LEN, SentVia, Session,
    normalize_phone, validate_email, validate_username,
};
use crate::error::ServerError;
use crate::usecase::otp::{IssueOtpUseCase, VerifyOtpUseCase};
use crate::usecase::random_string;

const BCRYPT_COST: u32 = 10;

const TOKEN_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub(crate) fn hash_password(raw: &str) -> Result<String, ServerError> {
    let hash = bcrypt::hash(raw, BCRYPT_COST).context("hash password")?;
    Ok(hash)
}

pub(crate) fn verify_password(raw: &str, hash: &str) -> bool {
    bcrypt::verify(raw, hash).unwrap_or(false)
}

pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registered {
    pub account_id: Uuid,
    pub sent_via: SentVia,
}

pub struct RegisterAccountUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub accounts: A,
    pub issuer: IssueOtpUseCase<O, N, D>,
}

impl<A, O, N, D> RegisterAccountUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub async fn execute(&self, input: RegisterInput) -> Result<Registered, ServerError> {
        // 1. Validate the request before touching storage.
        let username = input.username.trim();
        if !validate_username(username) {
            return Err(ServerError::InvalidUsername);
        }
        let email = input.email.trim();
        if !validate_email(email) {
            return Err(ServerError::InvalidEmail);
        }
        if input.password.chars().count() < 8 {
            return Err(ServerError::InvalidPassword);
        }
        let role = AccountRole::parse(&input.role).ok_or(ServerError::InvalidRole)?;
        let phone = normalize_phone(&input.phone).ok_or(ServerError::InvalidPhone)?;

        // 2. Uniqueness, each field with its own conflict answer.
        if self.accounts.username_taken(username).await? {
            return Err(ServerError::UsernameTaken);
        }
        if self.accounts.email_taken(email).await? {
            return Err(ServerError::EmailTaken);
        }
        if self.accounts.phone_taken(&phone).await? {
            return Err(ServerError::PhoneTaken);
        }

        // 3. Persist the account, unverified.
        let now = Utc::now();
        let account = Account {
            id: Uuid::now_v7(),
            username: username.to_owned(),
            email: email.to_owned(),
            phone,
            password_hash: hash_password(&input.password)?,
            role,
            address: input.address.filter(|a| !a.trim().is_empty()),
            phone_verified: false,
            created_at: now,
            updated_at: now,
        };
        self.accounts.create(&account).await?;

        // 4. The first registration code goes out immediately.
        let issued = self.issuer.execute(&account, OtpPurpose::Registration).await?;

        Ok(Registered {
            account_id: account.id,
            sent_via: issued.sent_via,
        })
    }
}

pub struct VerifyRegistrationUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub accounts: A,
    pub verifier: VerifyOtpUseCase<O>,
    pub notifications: N,
    pub dispatch: D,
}

impl<A, O, N, D> VerifyRegistrationUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub async fn execute(&self, account_id: Uuid, code: &str) -> Result<Account, ServerError> {
        // 1. The id came from the register response; a miss is a plain 404.
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(ServerError::AccountNotFound)?;

        // 2. Re-verifying a verified account is a no-op.
        if account.phone_verified {
            return Ok(account);
        }

        // 3. Burn the registration code.
        self.verifier
            .execute(account.id, OtpPurpose::Registration, code)
            .await?;

        // 4. Flip the flag and send the welcome note.
        let now = Utc::now();
        self.accounts.mark_phone_verified(account.id, now).await?;
        self.send_welcome(&account).await?;

        Ok(Account {
            phone_verified: true,
            updated_at: now,
            ..account
        })
    }

    async fn send_welcome(&self, account: &Account) -> Result<(), ServerError> {
        let subject = "Welcome to Mealdrop".to_owned();
        let body = format!(
            "Hi {}, your account is verified and ready to use.",
            account.username
        );

        let mail = self.dispatch.send_email(&account.email, &subject, &body).await;
        if let Err(e) = &mail {
            tracing::warn!(account_id = %account.id, error = %e, "welcome mail failed");
        }
        self.notifications
            .create(&Notification {
                id: Uuid::now_v7(),
                account_id: account.id,
                channel: NotificationChannel::Email,
                subject,
                body,
                sent: mail.is_ok(),
                error: mail.err().map(|e| e.to_string()),
                meal_id: None,
                claim_id: None,
                read_at: None,
                created_at: Utc::now(),
            })
            .await
    }
}

pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginChallenge {
    pub account_id: Uuid,
    pub sent_via: SentVia,
}

pub struct LoginUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub accounts: A,
    pub issuer: IssueOtpUseCase<O, N, D>,
}

impl<A, O, N, D> LoginUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub async fn execute(&self, input: LoginInput) -> Result<LoginChallenge, ServerError> {
        // 1. Look up by username; a miss reads the same as a bad password.
        let account = self
            .accounts
            .find_by_username(input.username.trim())
            .await?
            .ok_or(ServerError::InvalidCredentials)?;

        // 2. Password check before any code is minted. A failed login must
        //    leave no trace in the otp tables.
        if !verify_password(&input.password, &account.password_hash) {
            return Err(ServerError::InvalidCredentials);
        }

        // 3. Unverified accounts cannot enter phase two.
        if !account.phone_verified {
            return Err(ServerError::AccountNotVerified);
        }

        // 4. Mint the login code.
        let issued = self.issuer.execute(&account, OtpPurpose::Login).await?;

        Ok(LoginChallenge {
            account_id: account.id,
            sent_via: issued.sent_via,
        })
    }
}

/// Client details bound to the session at creation.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub session: Session,
    pub account: Account,
}

pub struct CompleteLoginUseCase<A, S, O>
where
    A: AccountRepository,
    S: SessionRepository,
    O: OtpRepository,
{
    pub accounts: A,
    pub sessions: S,
    pub verifier: VerifyOtpUseCase<O>,
    pub session_ttl_secs: i64,
}

impl<A, S, O> CompleteLoginUseCase<A, S, O>
where
    A: AccountRepository,
    S: SessionRepository,
    O: OtpRepository,
{
    pub async fn execute(
        &self,
        account_id: Uuid,
        code: &str,
        client: ClientInfo,
    ) -> Result<EstablishedSession, ServerError> {
        // 1. The id came from the login response.
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(ServerError::AccountNotFound)?;

        // 2. Burn the login code.
        self.verifier
            .execute(account.id, OtpPurpose::Login, code)
            .await?;

        // 3. Mint a session bound to the account's role and the client.
        let now = Utc::now();
        let session = Session {
            id: Uuid::now_v7(),
            account_id: account.id,
            token: random_string(TOKEN_CHARSET, SESSION_TOKEN_LEN),
            role: account.role,
            ip: client.ip,
            user_agent: client.user_agent,
            expires_at: now + Duration::seconds(self.session_ttl_secs),
            revoked_at: None,
            created_at: now,
        };
        self.sessions.create(&session).await?;

        Ok(EstablishedSession { session, account })
    }
}

#[derive(Debug, Clone)]
pub struct ResendOutcome {
    pub purpose: OtpPurpose,
    pub sent_via: SentVia,
}

pub struct ResendOtpUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub accounts: A,
    pub issuer: IssueOtpUseCase<O, N, D>,
}

impl<A, O, N, D> ResendOtpUseCase<A, O, N, D>
where
    A: AccountRepository,
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub async fn execute(&self, account_id: Uuid) -> Result<ResendOutcome, ServerError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(ServerError::AccountNotFound)?;

        // Unverified accounts are mid-registration; everyone else is asking
        // for a fresh login code.
        let purpose = if account.phone_verified {
            OtpPurpose::Login
        } else {
            OtpPurpose::Registration
        };
        let issued = self.issuer.execute(&account, purpose).await?;

        Ok(ResendOutcome {
            purpose,
            sent_via: issued.sent_via,
        })
    }
}

pub struct LogoutUseCase<S: SessionRepository> {
    pub sessions: S,
}

impl<S: SessionRepository> LogoutUseCase<S> {
    pub async fn execute(&self, session_id: Uuid) -> Result<(), ServerError> {
        self.sessions.revoke(session_id, Utc::now()).await
    }
}

pub struct GetAccountUseCase<A: AccountRepository> {
    pub accounts: A,
}

impl<A: AccountRepository> GetAccountUseCase<A> {
    pub async fn execute(&self, account_id: Uuid) -> Result<Account, ServerError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(ServerError::AccountNotFound)
    }
}
