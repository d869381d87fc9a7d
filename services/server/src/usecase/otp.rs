//! One-time code issuing and verification.
//!
//! Issuing supersedes whatever is still live for the (account, purpose)
//! pair, so at most one code can verify at any moment. Verification burns
//! an attempt slot before comparing, which caps guessing even under
//! concurrent submissions.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::OtpConfig;
use crate::domain::repository::{
    DispatchError, DispatchPort, NotificationRepository, OtpRepository,
};
use crate::domain::types::{
    Account, Notification, NotificationChannel, OtpPurpose, OtpRecord, SentVia,
};
use crate::error::ServerError;
use crate::usecase::random_string;

const CODE_CHARSET: &[u8] = b"0123456789";

/// Outcome of an issue request: the live record plus which channel, if any,
/// carried it to the account.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub record: OtpRecord,
    pub sent_via: SentVia,
}

pub struct IssueOtpUseCase<O, N, D>
where
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub otp_codes: O,
    pub notifications: N,
    pub dispatch: D,
    pub config: OtpConfig,
}

impl<O, N, D> IssueOtpUseCase<O, N, D>
where
    O: OtpRepository,
    N: NotificationRepository,
    D: DispatchPort,
{
    pub async fn execute(
        &self,
        account: &Account,
        purpose: OtpPurpose,
    ) -> Result<IssuedOtp, ServerError> {
        let now = Utc::now();

        // 1. Damping: a code minted moments ago is returned as-is so a
        //    double-tapped button cannot invalidate the SMS in flight.
        if let Some(latest) = self.otp_codes.find_latest(account.id, purpose).await? {
            let fresh_until =
                latest.created_at + Duration::seconds(self.config.reissue_cooldown_secs);
            if !latest.is_verified() && !latest.is_expired_at(now) && fresh_until > now {
                return Ok(IssuedOtp {
                    record: latest,
                    sent_via: SentVia::AlreadySent,
                });
            }
        }

        // 2. Supersede whatever is still live for this pair.
        self.otp_codes
            .expire_active(account.id, purpose, now)
            .await?;

        // 3. Mint and persist the new code.
        let record = OtpRecord {
            id: Uuid::now_v7(),
            account_id: account.id,
            code: random_string(CODE_CHARSET, self.config.code_len),
            purpose,
            attempts: 0,
            expires_at: now + Duration::seconds(self.config.ttl_secs),
            verified_at: None,
            created_at: now,
        };
        self.otp_codes.create(&record).await?;

        // 4. Deliver, SMS first, mail as fallback. Delivery trouble never
        //    fails issuance; every attempt leaves a notification row.
        let sent_via = self.deliver(account, purpose, &record.code).await?;

        Ok(IssuedOtp { record, sent_via })
    }

    async fn deliver(
        &self,
        account: &Account,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<SentVia, ServerError> {
        let subject = format!("Mealdrop {} code", purpose_label(purpose));
        let body = format!(
            "Your Mealdrop {} code is {code}. It expires in {} minutes.",
            purpose_label(purpose),
            self.config.ttl_secs / 60,
        );

        let sms = self.dispatch.send_sms(&account.phone, &body).await;
        self.record_attempt(account.id, NotificationChannel::Sms, &subject, &body, &sms)
            .await?;
        if sms.is_ok() {
            return Ok(SentVia::Sms);
        }

        let mail = self.dispatch.send_email(&account.email, &subject, &body).await;
        self.record_attempt(account.id, NotificationChannel::Email, &subject, &body, &mail)
            .await?;
        if mail.is_ok() {
            return Ok(SentVia::Email);
        }

        tracing::warn!(
            account_id = %account.id,
            purpose = purpose.as_str(),
            "otp delivery failed on both channels"
        );
        Ok(SentVia::None)
    }

    async fn record_attempt(
        &self,
        account_id: Uuid,
        channel: NotificationChannel,
        subject: &str,
        body: &str,
        result: &Result<(), DispatchError>,
    ) -> Result<(), ServerError> {
        let notification = Notification {
            id: Uuid::now_v7(),
            account_id,
            channel,
            subject: subject.to_owned(),
            body: body.to_owned(),
            sent: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            meal_id: None,
            claim_id: None,
            read_at: None,
            created_at: Utc::now(),
        };
        self.notifications.create(&notification).await
    }
}

pub struct VerifyOtpUseCase<O: OtpRepository> {
    pub otp_codes: O,
    pub config: OtpConfig,
}

impl<O: OtpRepository> VerifyOtpUseCase<O> {
    pub async fn execute(
        &self,
        account_id: Uuid,
        purpose: OtpPurpose,
        submitted: &str,
    ) -> Result<(), ServerError> {
        let now = Utc::now();

        // 1. Latest record for the pair, whatever its state.
        let record = self
            .otp_codes
            .find_latest(account_id, purpose)
            .await?
            .ok_or(ServerError::OtpNotFound)?;

        // 2. A verified code never verifies twice.
        if record.is_verified() {
            return Err(ServerError::OtpAlreadyVerified);
        }

        // 3. Expiry before attempts: a dead code spends no slots.
        if record.is_expired_at(now) {
            return Err(ServerError::OtpExpired);
        }

        // 4. Take an attempt slot; none left means the code is burned,
        //    even for a correct submission.
        if !self
            .otp_codes
            .consume_attempt(record.id, self.config.attempt_cap)
            .await?
        {
            return Err(ServerError::OtpAttemptsExceeded);
        }

        // 5. Compare and stamp. Losing the stamp race surfaces the same as
        //    a replay.
        if record.code != submitted {
            return Err(ServerError::OtpMismatch);
        }
        if !self.otp_codes.mark_verified(record.id, now).await? {
            return Err(ServerError::OtpAlreadyVerified);
        }
        Ok(())
    }
}

fn purpose_label(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Registration => "registration",
        OtpPurpose::Login => "login",
        OtpPurpose::PasswordReset => "password reset",
        OtpPurpose::Collection => "collection",
    }
}
