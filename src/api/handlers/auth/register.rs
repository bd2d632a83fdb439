//! Account registration endpoint.

use axum::{
    extract::{Extension, Multipart},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::service::RegisterInput;
use super::state::AuthState;
use super::types::AccountResponse;
use crate::api::error::AuthError;
use crate::api::handlers::upload::{spool_field, SpooledUpload};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Validation or upload error", body = crate::api::error::ErrorBody),
        (status = 409, description = "Username or email already in use", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let fields = match collect_fields(multipart).await {
        Ok(fields) => fields,
        Err(err) => return err.into_response(),
    };

    let Some(avatar) = fields.avatar else {
        return AuthError::validation("Avatar file is required").into_response();
    };

    let input = RegisterInput {
        full_name: fields.full_name.unwrap_or_default(),
        email: fields.email.unwrap_or_default(),
        username: fields.username.unwrap_or_default(),
        secret: fields.password.unwrap_or_default(),
        avatar_path: avatar.path().to_path_buf(),
        cover_image_path: fields
            .cover_image
            .as_ref()
            .map(|upload| upload.path().to_path_buf()),
    };

    // The spooled guards stay alive until here; whatever the media store did
    // not consume is removed when they drop.
    match state.sessions().register(input).await {
        Ok(account) => (StatusCode::CREATED, Json(AccountResponse::from(account))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Default)]
struct RegisterFields {
    full_name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    avatar: Option<SpooledUpload>,
    cover_image: Option<SpooledUpload>,
}

async fn collect_fields(mut multipart: Multipart) -> Result<RegisterFields, AuthError> {
    let mut fields = RegisterFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AuthError::validation("Malformed multipart payload"))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match name.as_str() {
            "full_name" => fields.full_name = read_text(field).await?,
            "email" => fields.email = read_text(field).await?,
            "username" => fields.username = read_text(field).await?,
            "password" => fields.password = read_text(field).await?,
            "avatar" => fields.avatar = spool_field(field).await?,
            "cover_image" => fields.cover_image = spool_field(field).await?,
            _ => {}
        }
    }

    Ok(fields)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<Option<String>, AuthError> {
    field
        .text()
        .await
        .map(Some)
        .map_err(|_| AuthError::validation("Malformed multipart payload"))
}
