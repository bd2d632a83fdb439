//! Session renewal and teardown endpoints.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::cookies::{
    clear_cookie, cookie_value, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
};
use super::login::session_cookies;
use super::principal::require_auth;
use super::state::AuthState;
use super::types::{RefreshRequest, TokenPairResponse};

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = TokenPairResponse),
        (status = 401, description = "Missing, invalid, expired, or replayed refresh token", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    // Cookie first, body as fallback for non-browser clients.
    let presented = cookie_value(&headers, REFRESH_COOKIE_NAME)
        .or_else(|| payload.and_then(|Json(request)| request.refresh_token));

    match state.sessions().refresh(presented.as_deref()).await {
        Ok(pair) => {
            let cookie_headers = session_cookies(&state, &pair);
            let response = TokenPairResponse {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            };
            (StatusCode::OK, cookie_headers, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared"),
        (status = 401, description = "Missing or invalid access token", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    if let Err(err) = state.sessions().logout(principal.account_id).await {
        return err.into_response();
    }

    (StatusCode::NO_CONTENT, clear_session_cookies(&state)).into_response()
}

pub(super) fn clear_session_cookies(state: &AuthState) -> HeaderMap {
    let secure = state.config().cookie_secure();
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_cookie(ACCESS_COOKIE_NAME, secure) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_cookie(REFRESH_COOKIE_NAME, secure) {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}
