//! Typed error taxonomy for the account and session core.
//!
//! Core operations return [`AuthError`] so callers can react to the kind of
//! failure without depending on transport types. The axum mapping lives here
//! as well: each kind maps to exactly one status code and a safe message.
//! Internal errors are logged server-side and never echoed to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input; the caller can retry with corrected data.
    #[error("{0}")]
    Validation(String),
    /// Username or email collides with an existing account.
    #[error("username or email already in use")]
    DuplicateIdentity,
    #[error("account not found")]
    NotFound,
    /// Wrong password, or a bad/expired/replayed token. Kept deliberately
    /// uniform so callers cannot tell which check failed.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// No credential was presented at all.
    #[error("authentication required")]
    Unauthenticated,
    #[error("media upload failed")]
    UploadFailed,
    /// A stored secret digest could not be parsed. Storage invariant
    /// violation, never caused by user input.
    #[error("stored secret digest is corrupt")]
    CorruptDigest,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateIdentity => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::UploadFailed => StatusCode::BAD_REQUEST,
            Self::CorruptDigest | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Uniform error envelope returned for every failed request.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 500-class kinds carry internal detail (library errors, invariant
        // violations); log it and hand the client a generic message.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {self:#}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
