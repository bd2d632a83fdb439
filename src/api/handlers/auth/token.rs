//! Signed access and refresh token issuance and verification.
//!
//! Both token classes are HS256 JWTs signed with class-specific secrets: a
//! leaked access secret must not allow forging refresh tokens, so the two
//! secrets are required to differ. Verification is strict (zero leeway) and
//! purely functional over the configured secrets and lifetimes.

use anyhow::anyhow;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 10 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a long-lived refresh token. Identity only; profile
/// fields are re-read from storage when the token is redeemed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    /// Parse the embedded account id.
    ///
    /// # Errors
    /// Returns `Invalid` when `sub` is not a UUID.
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }
}

impl RefreshClaims {
    /// Parse the embedded account id.
    ///
    /// # Errors
    /// Returns `Invalid` when `sub` is not a UUID.
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }
}

/// Signing and verification material for both token classes.
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenKeys {
    /// Build the key set from the two configured secrets.
    ///
    /// # Errors
    ///
    /// Returns `Config` when either secret is empty or when the two secrets
    /// are the same value.
    pub fn new(
        access_secret: &SecretString,
        refresh_secret: &SecretString,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Result<Self, crate::api::error::AuthError> {
        use crate::api::error::AuthError;

        let access = access_secret.expose_secret();
        let refresh = refresh_secret.expose_secret();
        if access.is_empty() {
            return Err(AuthError::Config(
                "access token secret must not be empty".to_string(),
            ));
        }
        if refresh.is_empty() {
            return Err(AuthError::Config(
                "refresh token secret must not be empty".to_string(),
            ));
        }
        if access == refresh {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".to_string(),
            ));
        }

        Ok(Self {
            access_encoding: EncodingKey::from_secret(access.as_bytes()),
            access_decoding: DecodingKey::from_secret(access.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
        })
    }

    /// Mint an access token for an account.
    ///
    /// # Errors
    /// Returns `Internal` if encoding fails.
    pub fn issue_access(
        &self,
        account_id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<String, crate::api::error::AuthError> {
        let now = now_unix();
        let claims = AccessClaims {
            sub: account_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.access_ttl_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|err| anyhow!("failed to sign access token: {err}").into())
    }

    /// Mint a refresh token for an account.
    ///
    /// # Errors
    /// Returns `Internal` if encoding fails.
    pub fn issue_refresh(&self, account_id: Uuid) -> Result<String, crate::api::error::AuthError> {
        let now = now_unix();
        let claims = RefreshClaims {
            sub: account_id.to_string(),
            iat: now,
            exp: now + self.refresh_ttl_seconds,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.refresh_encoding,
        )
        .map_err(|err| anyhow!("failed to sign refresh token: {err}").into())
    }

    /// Verify an access token and return its claims.
    ///
    /// # Errors
    /// Returns `Expired` past the embedded expiry, `Invalid` for any
    /// signature or structural failure.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.access_decoding, &strict_validation())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    /// Verify a refresh token and return its claims.
    ///
    /// # Errors
    /// Returns `Expired` past the embedded expiry, `Invalid` for any
    /// signature or structural failure.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &strict_validation())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is exact; the access window is short enough that clock leeway
    // would visibly extend it.
    validation.leeway = 0;
    validation
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}
