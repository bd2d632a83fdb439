//! Auth configuration and shared state.

use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;

use super::service::SessionManager;
use super::storage::CredentialStore;
use super::token::{TokenKeys, DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS};
use crate::api::error::AuthError;
use crate::api::media::MediaStore;

const DEFAULT_FRONTEND_BASE_URL: &str = "https://vidra.dev";

/// Static configuration for the session/token subsystem. Built once at
/// startup and injected; nothing in the core reads process globals.
#[derive(Clone)]
pub struct AuthConfig {
    access_token_secret: SecretString,
    refresh_token_secret: SecretString,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    frontend_base_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: String) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Cookies are only marked Secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    /// Build the signing key set from the configured secrets.
    ///
    /// # Errors
    /// Returns `Config` when either secret is empty or both are equal.
    pub fn token_keys(&self) -> Result<TokenKeys, AuthError> {
        TokenKeys::new(
            &self.access_token_secret,
            &self.refresh_token_secret,
            self.access_token_ttl_seconds,
            self.refresh_token_ttl_seconds,
        )
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"***")
            .field("refresh_token_secret", &"***")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("frontend_base_url", &self.frontend_base_url)
            .finish()
    }
}

/// Request-scoped handle shared with every handler.
pub struct AuthState {
    config: AuthConfig,
    sessions: SessionManager,
}

impl AuthState {
    /// Assemble the session manager from configuration and collaborators.
    ///
    /// # Errors
    /// Fails fast with `Config` on unusable token secrets.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        media: Arc<dyn MediaStore>,
    ) -> Result<Self, AuthError> {
        let keys = config.token_keys()?;
        Ok(Self {
            config,
            sessions: SessionManager::new(store, media, keys),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}
