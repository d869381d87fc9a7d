//! Environment-driven configuration, loaded once at startup.

use crate::domain::types::{
    OTP_ATTEMPT_CAP, OTP_CODE_LEN, OTP_REISSUE_COOLDOWN_SECS, OTP_TTL_SECS, SESSION_TTL_SECS,
};

/// One-time-code issuing and verification knobs.
#[derive(Debug, Clone, Copy)]
pub struct OtpConfig {
    /// Code length in digits. Env: `OTP_CODE_LEN`.
    pub code_len: usize,
    /// Seconds a code stays valid. Env: `OTP_TTL_SECS`.
    pub ttl_secs: i64,
    /// Submissions allowed per code. Env: `OTP_ATTEMPT_CAP`.
    pub attempt_cap: i32,
    /// Window in which a repeated issue request returns the code already in
    /// flight. Env: `OTP_REISSUE_COOLDOWN_SECS`.
    pub reissue_cooldown_secs: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_len: OTP_CODE_LEN,
            ttl_secs: OTP_TTL_SECS,
            attempt_cap: OTP_ATTEMPT_CAP,
            reissue_cooldown_secs: OTP_REISSUE_COOLDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL connection URL. Env: `DATABASE_URL` (required).
    pub database_url: String,
    /// Port the HTTP listener binds. Env: `SERVER_PORT`, default 3400.
    pub server_port: u16,
    /// Domain attribute on the session cookie. Env: `COOKIE_DOMAIN`,
    /// default `localhost`.
    pub cookie_domain: String,
    /// SMS gateway endpoint. Unset means console delivery.
    /// Env: `SMS_GATEWAY_URL`.
    pub sms_gateway_url: Option<String>,
    /// Mail gateway endpoint. Unset means console delivery.
    /// Env: `MAIL_GATEWAY_URL`.
    pub mail_gateway_url: Option<String>,
    /// Bearer token sent to both gateways. Env: `GATEWAY_TOKEN`.
    pub gateway_token: Option<String>,
    pub otp: OtpConfig,
    /// Session lifetime in seconds. Env: `SESSION_TTL_SECS`, default 7 days.
    pub session_ttl_secs: i64,
    /// Period of the expired-meal sweep in seconds. Unset disables the
    /// background task. Env: `MEAL_SWEEP_INTERVAL_SECS`.
    pub sweep_interval_secs: Option<u64>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            server_port: env_parse("SERVER_PORT", 3400),
            cookie_domain: std::env::var("COOKIE_DOMAIN")
                .unwrap_or_else(|_| "localhost".to_owned()),
            sms_gateway_url: std::env::var("SMS_GATEWAY_URL").ok(),
            mail_gateway_url: std::env::var("MAIL_GATEWAY_URL").ok(),
            gateway_token: std::env::var("GATEWAY_TOKEN").ok(),
            otp: OtpConfig {
                code_len: env_parse("OTP_CODE_LEN", OTP_CODE_LEN),
                ttl_secs: env_parse("OTP_TTL_SECS", OTP_TTL_SECS),
                attempt_cap: env_parse("OTP_ATTEMPT_CAP", OTP_ATTEMPT_CAP),
                reissue_cooldown_secs: env_parse(
                    "OTP_REISSUE_COOLDOWN_SECS",
                    OTP_REISSUE_COOLDOWN_SECS,
                ),
            },
            session_ttl_secs: env_parse("SESSION_TTL_SECS", SESSION_TTL_SECS),
            sweep_interval_secs: std::env::var("MEAL_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
