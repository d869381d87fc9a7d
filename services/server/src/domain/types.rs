//! Core domain types shared by usecases, handlers, and the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::geo::GeoPoint;

/// One-time code length in digits.
pub const OTP_CODE_LEN: usize = 6;

/// One-time code lifetime in seconds.
pub const OTP_TTL_SECS: i64 = 600;

/// Submissions allowed against a single code before it is dead.
pub const OTP_ATTEMPT_CAP: i32 = 5;

/// Window in which a repeated issue request returns the code already in
/// flight instead of minting a new one.
pub const OTP_REISSUE_COOLDOWN_SECS: i64 = 3;

/// Collection confirmation code length (uppercase alphanumeric).
pub const CONFIRMATION_CODE_LEN: usize = 8;

/// Session token length (alphanumeric).
pub const SESSION_TOKEN_LEN: usize = 32;

/// Session lifetime in seconds (7 days).
pub const SESSION_TTL_SECS: i64 = 604_800;

/// Largest portion count a single meal may advertise.
pub const MAX_MEAL_QUANTITY: i32 = 500;

/// Smallest pickup radius a meal may advertise, in kilometers.
pub const MIN_RADIUS_KM: f64 = 0.5;

/// Largest pickup radius a meal may advertise, in kilometers.
pub const MAX_RADIUS_KM: f64 = 50.0;

/// Pickup radius applied when the provider does not give one.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// A registered marketplace account. `phone_verified` stays false until the
/// registration code is confirmed; unverified accounts cannot log in.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: AccountRole,
    pub address: Option<String>,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a one-time code proves when verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Registration,
    Login,
    PasswordReset,
    Collection,
}

impl OtpPurpose {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Registration),
            1 => Some(Self::Login),
            2 => Some(Self::PasswordReset),
            3 => Some(Self::Collection),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Registration => 0,
            Self::Login => 1,
            Self::PasswordReset => 2,
            Self::Collection => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
            Self::Collection => "collection",
        }
    }
}

/// A single issued one-time code. At most one unverified, unexpired record
/// exists per (account, purpose) pair; issuing a new code expires the rest.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub purpose: OtpPurpose,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

/// A server-side session row. The opaque token is the only credential a
/// client holds; revocation and expiry are checked on every request.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub role: AccountRole,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Breakfast),
            1 => Some(Self::Lunch),
            2 => Some(Self::Dinner),
            3 => Some(Self::Snack),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Breakfast => 0,
            Self::Lunch => 1,
            Self::Dinner => 2,
            Self::Snack => 3,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "breakfast" => Some(Self::Breakfast),
            "lunch" => Some(Self::Lunch),
            "dinner" => Some(Self::Dinner),
            "snack" => Some(Self::Snack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

/// A posted surplus meal. `active` is the provider's own switch; `expired`
/// is flipped by the system once the serving time passes or the quantity
/// runs out. Both must hold for the meal to be claimable.
#[derive(Debug, Clone)]
pub struct Meal {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub meal_type: MealType,
    pub total_quantity: i32,
    pub remaining_quantity: i32,
    pub serving_at: DateTime<Utc>,
    pub pickup_address: String,
    pub location: GeoPoint,
    pub radius_km: f64,
    pub active: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meal {
    /// Whether a new claim may be opened against this meal right now.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.expired && self.remaining_quantity > 0 && self.serving_at > now
    }

    /// Whether `origin` falls inside this meal's advertised pickup radius.
    pub fn within_radius_of(&self, origin: &GeoPoint) -> bool {
        origin.distance_km(&self.location) <= self.radius_km
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Confirmed,
    Collected,
    Cancelled,
}

impl ClaimStatus {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Confirmed),
            2 => Some(Self::Collected),
            3 => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::Collected => 2,
            Self::Cancelled => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Collected => "collected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed claims hold a quantity reservation.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/// A beneficiary's reservation against a meal. The confirmation code is
/// handed out once at creation and presented at pickup.
#[derive(Debug, Clone)]
pub struct Claim {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub beneficiary_id: Uuid,
    pub quantity: i32,
    pub status: ClaimStatus,
    pub confirmation_code: String,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Sms,
    Email,
    InApp,
}

impl NotificationChannel {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Sms),
            1 => Some(Self::Email),
            2 => Some(Self::InApp),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Sms => 0,
            Self::Email => 1,
            Self::InApp => 2,
        }
    }
}

/// Audit row for every outbound message and in-app notice. Failed dispatch
/// attempts are recorded with `sent = false` and the gateway error text.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub account_id: Uuid,
    pub channel: NotificationChannel,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    pub error: Option<String>,
    pub meal_id: Option<Uuid>,
    pub claim_id: Option<Uuid>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Which channel actually carried a one-time code to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentVia {
    Sms,
    Email,
    AlreadySent,
    None,
}

/// Normalize a phone number to a `+`-prefixed digit string.
///
/// Separators (spaces, dashes, dots, parentheses) are stripped. The digit
/// count must land in the E.164 range of 7 to 15.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let rest = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = String::with_capacity(rest.len());
    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    if !(7..=15).contains(&digits.len()) {
        return None;
    }
    Some(format!("+{digits}"))
}

/// Minimal shape check: one `@` with a non-empty local part and a domain
/// containing a dot.
pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.contains(' ')
        && !domain.contains('@')
}

/// Usernames are 3 to 32 chars of ASCII alphanumerics, `_`, `.` or `-`,
/// and must start with an alphanumeric.
pub fn validate_username(username: &str) -> bool {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return false;
    }
    let mut chars = username.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
