//! Account role types and the role capability check.

use serde::{Deserialize, Serialize};

/// What an account is allowed to do on the marketplace.
///
/// Wire format: `i16` (0 = Beneficiary, 1 = Provider). Roles are flat
/// capabilities, not privilege levels; an account's role never changes
/// after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Beneficiary = 0,
    Provider = 1,
}

impl AccountRole {
    /// Convert from `i16` storage value. Returns `None` for unknown values.
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(Self::Beneficiary),
            1 => Some(Self::Provider),
            _ => None,
        }
    }

    /// Convert to `i16` storage value.
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Parse the registration wire string (`"beneficiary"` / `"provider"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "beneficiary" => Some(Self::Beneficiary),
            "provider" => Some(Self::Provider),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beneficiary => "beneficiary",
            Self::Provider => "provider",
        }
    }
}

/// Capability check carried by anything that represents an authenticated
/// caller (a session identity, a test double).
///
/// Operations declare the role they require and ask the guard once at
/// entry instead of comparing raw role integers inline.
pub trait RoleGuard {
    fn role(&self) -> AccountRole;

    /// True when the bearer may perform an operation restricted to
    /// `required`.
    fn can_act_as(&self, required: AccountRole) -> bool {
        self.role() == required
    }
}
