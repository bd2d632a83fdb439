//! OpenAPI document for the service.

use utoipa::OpenApi;

use crate::api::error::ErrorBody;
use crate::api::handlers::auth::types::{
    AccountResponse, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest,
    TokenPairResponse, UpdateProfileRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::auth::register::register,
        crate::api::handlers::auth::login::login,
        crate::api::handlers::auth::session::refresh,
        crate::api::handlers::auth::session::logout,
        crate::api::handlers::auth::password::change_password,
        crate::api::handlers::account::get_me,
        crate::api::handlers::account::update_profile,
        crate::api::handlers::account::update_avatar,
        crate::api::handlers::account::update_cover_image,
        crate::api::handlers::health::health,
    ),
    components(schemas(
        AccountResponse,
        ChangePasswordRequest,
        ErrorBody,
        LoginRequest,
        LoginResponse,
        RefreshRequest,
        TokenPairResponse,
        UpdateProfileRequest,
    )),
    tags(
        (name = "auth", description = "Registration and session lifecycle"),
        (name = "me", description = "Authenticated self-service"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        for expected in [
            "/v1/auth/register",
            "/v1/auth/login",
            "/v1/auth/refresh",
            "/v1/auth/logout",
            "/v1/auth/password",
            "/v1/me",
            "/v1/me/avatar",
            "/v1/me/cover",
            "/health",
        ] {
            assert!(
                paths.iter().any(|path| path == expected),
                "missing path {expected}"
            );
        }
    }
}
