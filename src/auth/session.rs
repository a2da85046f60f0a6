//! Per-request session context: who the caller is and where their data lives.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use chrono::Utc;
use rand::{distributions::Uniform, Rng};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const GUEST_MODE_COOKIE: &str = "guest_mode";
pub const GUEST_SESSION_COOKIE: &str = "guest_session";
const GUEST_SUFFIX_LEN: usize = 13;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionContext {
    Authenticated(Uuid),
    Guest(String),
}

impl SessionContext {
    pub fn mode(&self) -> &'static str {
        match self {
            SessionContext::Authenticated(_) => "authenticated",
            SessionContext::Guest(_) => "guest",
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, SessionContext::Guest(_))
    }
}

/// A bearer token always wins; an invalid one is rejected rather than
/// falling through to the guest cookies. Guest cookies only count for
/// sessions this server started and that have not expired.
#[async_trait]
impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(AUTHORIZATION) {
            let TypedHeader(Authorization(bearer)) =
                TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                    .await
                    .map_err(|_| AppError::unauthorized())?;

            let claims = state
                .jwt
                .verify_token(bearer.token())
                .map_err(|_| AppError::unauthorized())?;
            return Ok(SessionContext::Authenticated(claims.sub));
        }

        let cookies = TypedHeader::<Cookie>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::unauthorized())?;
        let session = guest_from_cookies(&cookies).ok_or_else(AppError::unauthorized)?;
        if let SessionContext::Guest(id) = &session {
            if !state.persistence.guests().touch(id).await {
                return Err(AppError::unauthorized());
            }
        }
        Ok(session)
    }
}

fn guest_from_cookies(cookies: &Cookie) -> Option<SessionContext> {
    if cookies.get(GUEST_MODE_COOKIE) != Some("true") {
        return None;
    }
    cookies
        .get(GUEST_SESSION_COOKIE)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| SessionContext::Guest(id.to_string()))
}

/// `guest_<unix millis>_<13 base36 chars>`.
pub fn generate_guest_session_id() -> String {
    let alphabet = Uniform::from(0..BASE36.len());
    let suffix: String = rand::thread_rng()
        .sample_iter(alphabet)
        .take(GUEST_SUFFIX_LEN)
        .map(|index| BASE36[index] as char)
        .collect();
    format!("guest_{}_{suffix}", Utc::now().timestamp_millis())
}

pub fn guest_cookies(session_id: &str, secure: bool) -> AppResult<[HeaderValue; 2]> {
    Ok([
        build_cookie(GUEST_MODE_COOKIE, "true", secure, false)?,
        build_cookie(GUEST_SESSION_COOKIE, session_id, secure, false)?,
    ])
}

pub fn clear_guest_cookies(secure: bool) -> AppResult<[HeaderValue; 2]> {
    Ok([
        build_cookie(GUEST_MODE_COOKIE, "", secure, true)?,
        build_cookie(GUEST_SESSION_COOKIE, "", secure, true)?,
    ])
}

fn build_cookie(name: &str, value: &str, secure: bool, expire: bool) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{name}={value}")];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Lax".into());
    if expire {
        parts.push("Max-Age=0".into());
        parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    }
    if secure {
        parts.push("Secure".into());
    }

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}
