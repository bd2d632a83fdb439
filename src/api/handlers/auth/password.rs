//! Password change endpoint for authenticated accounts.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::principal::require_auth;
use super::session::clear_session_cookies;
use super::state::AuthState;
use super::types::ChangePasswordRequest;
use crate::api::error::AuthError;

#[utoipa::path(
    post,
    path = "/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed; existing refresh token revoked"),
        (status = 401, description = "Missing access token or wrong current password", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    match state
        .sessions()
        .change_secret(
            principal.account_id,
            &request.current_password,
            &request.new_password,
        )
        .await
    {
        // The refresh slot was revoked with the secret change; drop the
        // now-useless cookies as well.
        Ok(()) => (StatusCode::NO_CONTENT, clear_session_cookies(&state)).into_response(),
        Err(err) => err.into_response(),
    }
}
