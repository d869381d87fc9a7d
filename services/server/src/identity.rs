//! Session cookie builders and the authenticated-identity extractor.

use axum::extract::FromRequestParts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use http::HeaderMap;
use http::request::Parts;
use time::Duration;
use uuid::Uuid;

use mealdrop_domain::account::{AccountRole, RoleGuard};

use crate::domain::repository::SessionRepository;
use crate::error::ServerError;
use crate::state::AppState;

/// Cookie name for the session token.
pub const MEALDROP_SESSION: &str = "mealdrop_session";

/// Set the session cookie on the jar.
///
/// ```
/// use axum_extra::extract::cookie::CookieJar;
/// use mealdrop_server::identity::{set_session_cookie, MEALDROP_SESSION};
///
/// let jar = CookieJar::new();
/// let jar = set_session_cookie(jar, "token_value".to_string(), "example.com".to_string(), 604800);
/// let cookie = jar.get(MEALDROP_SESSION).unwrap();
/// assert_eq!(cookie.path(), Some("/"));
/// assert_eq!(cookie.domain(), Some("example.com"));
/// assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604800)));
/// assert!(cookie.http_only().unwrap_or(false));
/// assert!(cookie.secure().unwrap_or(false));
/// ```
pub fn set_session_cookie(
    jar: CookieJar,
    value: String,
    domain: String,
    max_age_secs: i64,
) -> CookieJar {
    let cookie = Cookie::build((MEALDROP_SESSION, value))
        .path("/")
        .domain(domain)
        .max_age(Duration::seconds(max_age_secs))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// Clear the session cookie by setting Max-Age to 0.
///
/// ```
/// use axum_extra::extract::cookie::CookieJar;
/// use mealdrop_server::identity::{
///     clear_session_cookie, set_session_cookie, MEALDROP_SESSION,
/// };
///
/// let jar = CookieJar::new();
/// let jar = set_session_cookie(jar, "t".to_string(), "example.com".to_string(), 604800);
/// let jar = clear_session_cookie(jar, "example.com".to_string());
/// let cookie = jar.get(MEALDROP_SESSION).unwrap();
/// assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
/// ```
pub fn clear_session_cookie(jar: CookieJar, domain: String) -> CookieJar {
    let cookie = Cookie::build((MEALDROP_SESSION, ""))
        .path("/")
        .domain(domain)
        .max_age(Duration::ZERO)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// The account behind the current request, resolved from a live session row.
///
/// The token is taken from `Authorization: Bearer` first, then from the
/// session cookie. Returns 401 if neither carries a live session.
/// Role enforcement (403) is done by handlers after extraction.
#[derive(Debug, Clone)]
pub struct Identity {
    pub account_id: Uuid,
    pub role: AccountRole,
    pub session_id: Uuid,
}

impl RoleGuard for Identity {
    fn role(&self) -> AccountRole {
        self.role
    }
}

impl Identity {
    /// Gate an endpoint on the caller's role.
    pub fn require(&self, required: AccountRole) -> Result<(), ServerError> {
        if self.can_act_as(required) {
            Ok(())
        } else {
            Err(ServerError::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = ServerError;

    // axum-core 0.5 defines this as `fn -> impl Future + Send` (not `async fn`).
    // In Rust 1.82+ precise capturing, `async fn` captures lifetimes differently,
    // causing E0195. Fix: extract values synchronously, return a 'static async move block.
    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let token = bearer_token(&parts.headers).or_else(|| cookie_token(&parts.headers));
        let state = state.clone();

        async move {
            let token = token.ok_or(ServerError::Unauthorized)?;
            let session = state
                .session_repo()
                .find_active(&token, Utc::now())
                .await?
                .ok_or(ServerError::Unauthorized)?;
            Ok(Self {
                account_id: session.account_id,
                role: session.role,
                session_id: session.id,
            })
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(MEALDROP_SESSION)
        .map(|c| c.value().to_owned())
}
