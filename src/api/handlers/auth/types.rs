//! Request and response types for account and session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::storage::Account;

/// Public view of an account. Deliberately has no field for the secret
/// digest or the refresh token, so they cannot leak through serialization.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AccountResponse {
    pub id: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            full_name: account.full_name,
            username: account.username,
            email: account.email,
            avatar_url: account.avatar_url,
            cover_image_url: account.cover_image_url,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Login accepts either identity field, mirroring the web form.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub account: AccountResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh body; the token may also arrive via cookie.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateProfileRequest {
    pub full_name: String,
    pub email: String,
}
