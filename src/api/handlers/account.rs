//! Authenticated self-service endpoints: profile reads and updates.

use axum::{
    extract::{Extension, Multipart},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::auth::principal::require_auth;
use super::auth::state::AuthState;
use super::auth::types::{AccountResponse, UpdateProfileRequest};
use super::upload::{spool_field, SpooledUpload};
use crate::api::error::AuthError;

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated account", body = AccountResponse),
        (status = 401, description = "Missing or invalid access token", body = crate::api::error::ErrorBody)
    ),
    tag = "me"
)]
pub async fn get_me(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match state.sessions().current_account(principal.account_id).await {
        Ok(account) => (StatusCode::OK, Json(AccountResponse::from(account))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AccountResponse),
        (status = 400, description = "Validation error", body = crate::api::error::ErrorBody),
        (status = 409, description = "Email already in use", body = crate::api::error::ErrorBody)
    ),
    tag = "me"
)]
pub async fn update_profile(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateProfileRequest>>,
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
        .update_profile(principal.account_id, &request.full_name, &request.email)
        .await
    {
        Ok(account) => (StatusCode::OK, Json(AccountResponse::from(account))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/me/avatar",
    responses(
        (status = 200, description = "Avatar replaced", body = AccountResponse),
        (status = 400, description = "Missing file or failed upload", body = crate::api::error::ErrorBody)
    ),
    tag = "me"
)]
pub async fn update_avatar(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let upload = match single_file(multipart, "avatar").await {
        Ok(Some(upload)) => upload,
        Ok(None) => return AuthError::validation("Avatar file is required").into_response(),
        Err(err) => return err.into_response(),
    };

    match state
        .sessions()
        .update_avatar(principal.account_id, upload.path())
        .await
    {
        Ok(account) => (StatusCode::OK, Json(AccountResponse::from(account))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/me/cover",
    responses(
        (status = 200, description = "Cover image replaced", body = AccountResponse),
        (status = 400, description = "Missing file or failed upload", body = crate::api::error::ErrorBody)
    ),
    tag = "me"
)]
pub async fn update_cover_image(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let upload = match single_file(multipart, "cover_image").await {
        Ok(Some(upload)) => upload,
        Ok(None) => return AuthError::validation("Cover image file is required").into_response(),
        Err(err) => return err.into_response(),
    };

    match state
        .sessions()
        .update_cover_image(principal.account_id, upload.path())
        .await
    {
        Ok(account) => (StatusCode::OK, Json(AccountResponse::from(account))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Pull one named file field out of a multipart body.
async fn single_file(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<Option<SpooledUpload>, AuthError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AuthError::validation("Malformed multipart payload"))?
    {
        if field.name() == Some(field_name) {
            return spool_field(field).await;
        }
    }
    Ok(None)
}
