//! sea-orm entities for the Mealdrop server database.

pub mod accounts;
pub mod claims;
pub mod meals;
pub mod notifications;
pub mod otp_codes;
pub mod sessions;
