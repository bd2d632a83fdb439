//! Cookie and bearer-token plumbing for session endpoints.
//!
//! The core only produces and consumes token strings; everything about how
//! they ride on requests and responses lives here.

use axum::http::{
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
    HeaderMap, HeaderValue,
};

pub const ACCESS_COOKIE_NAME: &str = "vidra_access";
pub const REFRESH_COOKIE_NAME: &str = "vidra_refresh";

/// Build a `HttpOnly` cookie carrying a token.
///
/// # Errors
/// Returns an error when the token contains bytes invalid in a header.
pub fn token_cookie(
    name: &str,
    token: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build a cookie that clears a previously set token.
///
/// # Errors
/// Returns an error when the header value cannot be built.
pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read a named cookie from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

/// Read a bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
