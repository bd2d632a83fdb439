//! Authenticated principal extraction for guarded endpoints.
//!
//! Access tokens are stateless, so authentication is a pure verification
//! step: no storage round-trip. The account id always arrives at the core as
//! an explicit parameter derived here.

use axum::http::HeaderMap;
use uuid::Uuid;

use super::cookies::{bearer_token, cookie_value, ACCESS_COOKIE_NAME};
use super::state::AuthState;
use crate::api::error::AuthError;

/// Identity asserted by a verified access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub username: String,
}

fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_value(headers, ACCESS_COOKIE_NAME))
}

/// Resolve the access token on a request into a [`Principal`].
///
/// # Errors
///
/// `Unauthenticated` when no token is presented, `InvalidCredentials` when
/// the token fails verification.
pub fn require_auth(headers: &HeaderMap, state: &AuthState) -> Result<Principal, AuthError> {
    let token = extract_access_token(headers).ok_or(AuthError::Unauthenticated)?;
    let claims = state
        .sessions()
        .verify_access_token(&token)
        .map_err(|_| AuthError::InvalidCredentials)?;
    let account_id = claims
        .account_id()
        .map_err(|_| AuthError::InvalidCredentials)?;
    Ok(Principal {
        account_id,
        username: claims.username,
    })
}
