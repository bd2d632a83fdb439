//! Login endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::cookies::{token_cookie, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use super::service::TokenPair;
use super::state::AuthState;
use super::types::{AccountResponse, LoginRequest, LoginResponse};
use crate::api::error::AuthError;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::api::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    let Some(identity) = request.email.or(request.username) else {
        return AuthError::validation("Email or username is required").into_response();
    };

    match state.sessions().login(&identity, &request.password).await {
        Ok((account, pair)) => {
            let headers = session_cookies(&state, &pair);
            let response = LoginResponse {
                account: AccountResponse::from(account),
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            };
            (StatusCode::OK, headers, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Set both token cookies; tokens also travel in the body for non-browser
/// clients.
pub(super) fn session_cookies(state: &AuthState, pair: &TokenPair) -> HeaderMap {
    let config = state.config();
    let secure = config.cookie_secure();
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = token_cookie(
        ACCESS_COOKIE_NAME,
        &pair.access_token,
        config.access_token_ttl_seconds(),
        secure,
    ) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = token_cookie(
        REFRESH_COOKIE_NAME,
        &pair.refresh_token,
        config.refresh_token_ttl_seconds(),
        secure,
    ) {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::api::handlers::auth::storage::memory::MemoryCredentialStore;
    use crate::api::media::{MediaStore, UploadedMedia};
    use secrecy::SecretString;
    use std::path::Path;

    struct NoopMediaStore;

    impl MediaStore for NoopMediaStore {
        fn upload(&self, _local_path: &Path) -> anyhow::Result<Option<UploadedMedia>> {
            Ok(None)
        }
    }

    #[test]
    fn both_cookies_are_set() {
        let state = AuthState::new(
            AuthConfig::new(
                SecretString::from("access-secret"),
                SecretString::from("refresh-secret"),
            ),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(NoopMediaStore),
        )
        .expect("valid auth state");

        let pair = TokenPair {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
        };
        let headers = session_cookies(&state, &pair);
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("vidra_access=acc;"));
        assert!(cookies[1].starts_with("vidra_refresh=ref;"));
    }
}
