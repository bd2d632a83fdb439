//! Session lifecycle orchestration.
//!
//! `SessionManager` ties the hasher, token issuer, credential store, and
//! media store together and owns the session state machine: an account is
//! LoggedOut while its refresh-token slot is empty and Active while it holds
//! a value. Login and refresh fill the slot, logout clears it, and refresh
//! additionally rotates it with a compare-and-swap so a superseded token is
//! permanently rejected.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::secret::{hash_secret, verify_secret};
use super::storage::{Account, CredentialStore, NewAccount};
use super::token::{AccessClaims, TokenError, TokenKeys};
use crate::api::error::AuthError;
use crate::api::media::MediaStore;

/// Inputs for account registration. Paths point at spooled upload files
/// owned by the caller until the media store consumes them.
#[derive(Debug)]
pub struct RegisterInput {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub secret: String,
    pub avatar_path: PathBuf,
    pub cover_image_path: Option<PathBuf>,
}

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    media: Arc<dyn MediaStore>,
    keys: TokenKeys,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, media: Arc<dyn MediaStore>, keys: TokenKeys) -> Self {
        Self { store, media, keys }
    }

    /// Create an account. The avatar upload must succeed before anything is
    /// persisted; a failed cover upload is tolerated.
    ///
    /// # Errors
    ///
    /// `Validation` for blank fields or a malformed email, `UploadFailed`
    /// when the avatar cannot be stored, `DuplicateIdentity` on username or
    /// email collision.
    pub async fn register(&self, input: RegisterInput) -> Result<Account, AuthError> {
        let full_name = input.full_name.trim().to_string();
        let email = normalize_identity(&input.email);
        let username = normalize_identity(&input.username);

        if full_name.is_empty() || email.is_empty() || username.is_empty() {
            return Err(AuthError::validation("All fields are required"));
        }
        if input.secret.trim().is_empty() {
            return Err(AuthError::validation("All fields are required"));
        }
        if !valid_email(&email) {
            return Err(AuthError::validation("Invalid email"));
        }

        let avatar_url = match self.media.upload(&input.avatar_path) {
            Ok(Some(media)) => media.url,
            Ok(None) => return Err(AuthError::UploadFailed),
            Err(err) => {
                error!("avatar upload failed: {err:#}");
                return Err(AuthError::UploadFailed);
            }
        };

        // The cover is optional end to end: absent, missing on disk, or a
        // failed upload all leave the slot empty.
        let cover_image_url = input.cover_image_path.as_deref().and_then(|path| {
            match self.media.upload(path) {
                Ok(Some(media)) => Some(media.url),
                Ok(None) => None,
                Err(err) => {
                    warn!("cover image upload failed: {err:#}");
                    None
                }
            }
        });

        let secret_hash = hash_secret(&input.secret)?;
        let account = self
            .store
            .create(NewAccount {
                full_name,
                username,
                email,
                secret_hash,
                avatar_url,
                cover_image_url,
            })
            .await?;

        info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Verify credentials and open a session: mint both tokens and persist
    /// the refresh token. Any failure aborts the whole login; no partial
    /// token pair is ever returned.
    ///
    /// # Errors
    ///
    /// `NotFound` when no account matches the identity, `InvalidCredentials`
    /// when the secret does not verify.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<(Account, TokenPair), AuthError> {
        let identity = normalize_identity(identity);
        if identity.is_empty() {
            return Err(AuthError::validation("Email or username is required"));
        }

        let account = self
            .store
            .find_by_identity(&identity)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !verify_secret(secret, &account.secret_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.mint_pair(&account)?;
        self.store
            .set_refresh_token(account.id, Some(&pair.refresh_token))
            .await?;

        info!(account_id = %account.id, "session opened");
        Ok((account, pair))
    }

    /// Redeem a refresh token for a brand-new pair, rotating the stored
    /// slot. A token that no longer matches the slot has been rotated away
    /// (or cleared by logout) and is rejected even though its signature
    /// still verifies.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` when no token was presented, `InvalidCredentials`
    /// for every other failure so callers cannot tell which check tripped.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair, AuthError> {
        let presented = presented
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let claims = self
            .keys
            .verify_refresh(presented)
            .map_err(|_| AuthError::InvalidCredentials)?;
        let account_id = claims
            .account_id()
            .map_err(|_| AuthError::InvalidCredentials)?;

        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let pair = self.mint_pair(&account)?;
        let rotated = self
            .store
            .rotate_refresh_token(account.id, presented, &pair.refresh_token)
            .await?;
        if !rotated {
            warn!(account_id = %account.id, "stale refresh token presented");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(pair)
    }

    /// Close the session by clearing the refresh-token slot. Idempotent.
    ///
    /// # Errors
    /// Only on storage failure.
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AuthError> {
        self.store.set_refresh_token(account_id, None).await?;
        info!(%account_id, "session closed");
        Ok(())
    }

    /// Replace the account secret after verifying the current one. The
    /// stored refresh token is revoked in the same operation, so sessions
    /// opened under the old secret cannot renew.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing account, `InvalidCredentials` when the
    /// current secret does not verify, `Validation` for an empty new secret.
    pub async fn change_secret(
        &self,
        account_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !verify_secret(current, &account.secret_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let digest = hash_secret(new)?;
        self.store.replace_secret(account_id, &digest).await?;
        info!(%account_id, "secret replaced, refresh token revoked");
        Ok(())
    }

    /// Fetch the account behind an authenticated request.
    ///
    /// # Errors
    /// `NotFound` when the account no longer exists.
    pub async fn current_account(&self, account_id: Uuid) -> Result<Account, AuthError> {
        self.store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Update name and email. Both are required, mirroring the profile form.
    ///
    /// # Errors
    /// `Validation` for blank fields or a bad email, `DuplicateIdentity` on
    /// email collision, `NotFound` for a missing account.
    pub async fn update_profile(
        &self,
        account_id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Account, AuthError> {
        let full_name = full_name.trim();
        let email = normalize_identity(email);
        if full_name.is_empty() || email.is_empty() {
            return Err(AuthError::validation("Full name and email are required"));
        }
        if !valid_email(&email) {
            return Err(AuthError::validation("Invalid email"));
        }

        self.store
            .update_profile(account_id, full_name, &email)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Store a new avatar. The upload must succeed.
    ///
    /// # Errors
    /// `UploadFailed` when the file cannot be stored, `NotFound` for a
    /// missing account.
    pub async fn update_avatar(
        &self,
        account_id: Uuid,
        local_path: &Path,
    ) -> Result<Account, AuthError> {
        let media = self.require_upload(local_path)?;
        self.store
            .update_avatar(account_id, &media.url)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Store a new cover image. The upload must succeed.
    ///
    /// # Errors
    /// `UploadFailed` when the file cannot be stored, `NotFound` for a
    /// missing account.
    pub async fn update_cover_image(
        &self,
        account_id: Uuid,
        local_path: &Path,
    ) -> Result<Account, AuthError> {
        let media = self.require_upload(local_path)?;
        self.store
            .update_cover_image(account_id, &media.url)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Verify an access token for request authentication.
    ///
    /// # Errors
    /// Propagates [`TokenError`] from verification.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.keys.verify_access(token)
    }

    fn mint_pair(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let access_token = self
            .keys
            .issue_access(account.id, &account.username, &account.email)?;
        let refresh_token = self.keys.issue_refresh(account.id)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn require_upload(&self, local_path: &Path) -> Result<crate::api::media::UploadedMedia, AuthError> {
        match self.media.upload(local_path) {
            Ok(Some(media)) => Ok(media),
            Ok(None) => Err(AuthError::UploadFailed),
            Err(err) => {
                error!("media upload failed: {err:#}");
                Err(AuthError::UploadFailed)
            }
        }
    }
}

fn normalize_identity(value: &str) -> String {
    value.trim().to_lowercase()
}

fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::storage::memory::MemoryCredentialStore;
    use crate::api::handlers::auth::token::{
        DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS,
    };
    use crate::api::media::{MediaStore, UploadedMedia};
    use anyhow::anyhow;
    use secrecy::SecretString;

    /// Media store double that "uploads" any path it is given.
    struct StubMediaStore;

    impl MediaStore for StubMediaStore {
        fn upload(&self, local_path: &Path) -> anyhow::Result<Option<UploadedMedia>> {
            Ok(Some(UploadedMedia {
                url: format!("https://cdn.test/media/{}", local_path.display()),
            }))
        }
    }

    /// Media store double that always reports a missing source file.
    struct AbsentMediaStore;

    impl MediaStore for AbsentMediaStore {
        fn upload(&self, _local_path: &Path) -> anyhow::Result<Option<UploadedMedia>> {
            Ok(None)
        }
    }

    /// Media store double that fails outright.
    struct BrokenMediaStore;

    impl MediaStore for BrokenMediaStore {
        fn upload(&self, _local_path: &Path) -> anyhow::Result<Option<UploadedMedia>> {
            Err(anyhow!("disk full"))
        }
    }

    struct Harness {
        store: Arc<MemoryCredentialStore>,
        sessions: SessionManager,
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(StubMediaStore),
            DEFAULT_ACCESS_TTL_SECONDS,
            DEFAULT_REFRESH_TTL_SECONDS,
        )
    }

    fn harness_with(
        media: Arc<dyn MediaStore>,
        access_ttl: i64,
        refresh_ttl: i64,
    ) -> Harness {
        let store = Arc::new(MemoryCredentialStore::new());
        let keys = TokenKeys::new(
            &SecretString::from("access-secret"),
            &SecretString::from("refresh-secret"),
            access_ttl,
            refresh_ttl,
        )
        .expect("valid key config");
        let sessions = SessionManager::new(store.clone(), media, keys);
        Harness { store, sessions }
    }

    fn jane() -> RegisterInput {
        RegisterInput {
            full_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            username: "JaneD".to_string(),
            secret: "s3cret!".to_string(),
            avatar_path: PathBuf::from("a.png"),
            cover_image_path: None,
        }
    }

    #[tokio::test]
    async fn register_normalizes_identity_fields() -> Result<(), AuthError> {
        let harness = harness();
        let account = harness.sessions.register(jane()).await?;

        assert_eq!(account.username, "janed");
        assert_eq!(account.email, "jane@x.com");
        assert_eq!(account.full_name, "Jane Doe");
        assert!(account.avatar_url.starts_with("https://cdn.test/media/"));
        assert_eq!(account.cover_image_url, None);
        // Freshly registered accounts are logged out.
        assert_eq!(harness.store.stored_refresh_token(account.id), None);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let harness = harness();
        for (field, value) in [
            ("full_name", " "),
            ("email", ""),
            ("username", "  "),
            ("secret", ""),
        ] {
            let mut input = jane();
            match field {
                "full_name" => input.full_name = value.to_string(),
                "email" => input.email = value.to_string(),
                "username" => input.username = value.to_string(),
                _ => input.secret = value.to_string(),
            }
            let result = harness.sessions.register(input).await;
            assert!(
                matches!(result, Err(AuthError::Validation(_))),
                "expected validation error for blank {field}"
            );
        }
        assert_eq!(harness.store.len(), 0);
    }

    #[tokio::test]
    async fn register_rejects_malformed_email() {
        let harness = harness();
        let mut input = jane();
        input.email = "not-an-email".to_string();
        let result = harness.sessions.register(input).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_username_any_case_collides() -> Result<(), AuthError> {
        let harness = harness();
        harness.sessions.register(jane()).await?;

        let mut input = jane();
        input.email = "second@x.com".to_string();
        input.username = "JANED".to_string();
        let result = harness.sessions.register(input).await;

        assert!(matches!(result, Err(AuthError::DuplicateIdentity)));
        assert_eq!(harness.store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_avatar_upload_aborts_before_persisting() {
        for media in [
            Arc::new(AbsentMediaStore) as Arc<dyn MediaStore>,
            Arc::new(BrokenMediaStore),
        ] {
            let harness = harness_with(
                media,
                DEFAULT_ACCESS_TTL_SECONDS,
                DEFAULT_REFRESH_TTL_SECONDS,
            );
            let result = harness.sessions.register(jane()).await;
            assert!(matches!(result, Err(AuthError::UploadFailed)));
            assert_eq!(harness.store.len(), 0);
        }
    }

    #[tokio::test]
    async fn failed_cover_upload_is_tolerated() -> Result<(), AuthError> {
        // StubMediaStore would succeed, so exercise the tolerant path with a
        // store that only knows the avatar.
        struct AvatarOnly;
        impl MediaStore for AvatarOnly {
            fn upload(&self, local_path: &Path) -> anyhow::Result<Option<UploadedMedia>> {
                if local_path.ends_with("a.png") {
                    Ok(Some(UploadedMedia {
                        url: "https://cdn.test/media/a.png".to_string(),
                    }))
                } else {
                    Ok(None)
                }
            }
        }

        let harness = harness_with(
            Arc::new(AvatarOnly),
            DEFAULT_ACCESS_TTL_SECONDS,
            DEFAULT_REFRESH_TTL_SECONDS,
        );
        let mut input = jane();
        input.cover_image_path = Some(PathBuf::from("missing-cover.png"));
        let account = harness.sessions.register(input).await?;
        assert_eq!(account.cover_image_url, None);
        Ok(())
    }

    #[tokio::test]
    async fn login_issues_tokens_and_persists_refresh_slot() -> Result<(), AuthError> {
        let harness = harness();
        harness.sessions.register(jane()).await?;

        let (account, pair) = harness.sessions.login("janed", "s3cret!").await?;
        assert_eq!(account.username, "janed");
        assert_eq!(
            harness.store.stored_refresh_token(account.id),
            Some(pair.refresh_token.clone())
        );

        // Identity matching also works by email, any case.
        let (_, _) = harness.sessions.login("Jane@X.com", "s3cret!").await?;
        Ok(())
    }

    #[tokio::test]
    async fn login_failures_map_to_the_taxonomy() -> Result<(), AuthError> {
        let harness = harness();
        harness.sessions.register(jane()).await?;

        let unknown = harness.sessions.login("nobody", "s3cret!").await;
        assert!(matches!(unknown, Err(AuthError::NotFound)));

        let wrong = harness.sessions.login("janed", "wrong").await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let blank = harness.sessions.login("  ", "s3cret!").await;
        assert!(matches!(blank, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_replay() -> Result<(), AuthError> {
        let harness = harness();
        harness.sessions.register(jane()).await?;
        let (_, first) = harness.sessions.login("janed", "s3cret!").await?;

        let second = harness
            .sessions
            .refresh(Some(&first.refresh_token))
            .await?;
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_ne!(second.access_token, first.access_token);

        // Replaying the superseded token must fail although its signature
        // still verifies.
        let replay = harness.sessions.refresh(Some(&first.refresh_token)).await;
        assert!(matches!(replay, Err(AuthError::InvalidCredentials)));

        // The current token keeps working.
        let third = harness
            .sessions
            .refresh(Some(&second.refresh_token))
            .await?;
        assert_ne!(third.refresh_token, second.refresh_token);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_without_a_token_is_unauthenticated() {
        let harness = harness();
        assert!(matches!(
            harness.sessions.refresh(None).await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            harness.sessions.refresh(Some("  ")).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn refresh_with_garbage_is_invalid() {
        let harness = harness();
        let result = harness.sessions.refresh(Some("not.a.jwt")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn expired_refresh_token_is_invalid() -> Result<(), AuthError> {
        let harness = harness_with(Arc::new(StubMediaStore), DEFAULT_ACCESS_TTL_SECONDS, -10);
        harness.sessions.register(jane()).await?;
        let (_, pair) = harness.sessions.login("janed", "s3cret!").await?;

        let result = harness.sessions.refresh(Some(&pair.refresh_token)).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn logout_then_refresh_is_rejected() -> Result<(), AuthError> {
        let harness = harness();
        harness.sessions.register(jane()).await?;
        let (account, pair) = harness.sessions.login("janed", "s3cret!").await?;

        harness.sessions.logout(account.id).await?;
        assert_eq!(harness.store.stored_refresh_token(account.id), None);

        let result = harness.sessions.refresh(Some(&pair.refresh_token)).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        // Logout stays idempotent.
        harness.sessions.logout(account.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn change_secret_revokes_the_open_session() -> Result<(), AuthError> {
        let harness = harness();
        harness.sessions.register(jane()).await?;
        let (account, pair) = harness.sessions.login("janed", "s3cret!").await?;

        let wrong = harness
            .sessions
            .change_secret(account.id, "wrong", "n3w-secret")
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        harness
            .sessions
            .change_secret(account.id, "s3cret!", "n3w-secret")
            .await?;

        // The refresh token issued under the old secret is gone.
        let replay = harness.sessions.refresh(Some(&pair.refresh_token)).await;
        assert!(matches!(replay, Err(AuthError::InvalidCredentials)));

        // Old secret is dead, new secret works.
        let old = harness.sessions.login("janed", "s3cret!").await;
        assert!(matches!(old, Err(AuthError::InvalidCredentials)));
        harness.sessions.login("janed", "n3w-secret").await?;
        Ok(())
    }

    #[tokio::test]
    async fn profile_updates_validate_and_detect_collisions() -> Result<(), AuthError> {
        let harness = harness();
        let first = harness.sessions.register(jane()).await?;
        let mut other = jane();
        other.username = "other".to_string();
        other.email = "other@x.com".to_string();
        let second = harness.sessions.register(other).await?;

        let updated = harness
            .sessions
            .update_profile(first.id, "Jane D.", "Jane.Doe@X.com")
            .await?;
        assert_eq!(updated.full_name, "Jane D.");
        assert_eq!(updated.email, "jane.doe@x.com");

        let collision = harness
            .sessions
            .update_profile(second.id, "Other", "jane.doe@x.com")
            .await;
        assert!(matches!(collision, Err(AuthError::DuplicateIdentity)));

        let blank = harness.sessions.update_profile(first.id, "", "a@b.c").await;
        assert!(matches!(blank, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn avatar_and_cover_updates_require_the_upload() -> Result<(), AuthError> {
        let harness = harness();
        let account = harness.sessions.register(jane()).await?;

        let updated = harness
            .sessions
            .update_avatar(account.id, Path::new("new-avatar.png"))
            .await?;
        assert!(updated.avatar_url.contains("new-avatar.png"));

        let updated = harness
            .sessions
            .update_cover_image(account.id, Path::new("cover.png"))
            .await?;
        assert!(updated
            .cover_image_url
            .as_deref()
            .is_some_and(|url| url.contains("cover.png")));

        let broken = harness_with(
            Arc::new(BrokenMediaStore),
            DEFAULT_ACCESS_TTL_SECONDS,
            DEFAULT_REFRESH_TTL_SECONDS,
        );
        let result = broken
            .sessions
            .update_avatar(account.id, Path::new("x.png"))
            .await;
        assert!(matches!(result, Err(AuthError::UploadFailed)));
        Ok(())
    }

    /// The end-to-end scenario from the service contract: register, login,
    /// reject a wrong password, refresh, reject the replay.
    #[tokio::test]
    async fn register_login_refresh_scenario() -> Result<(), AuthError> {
        let harness = harness();

        let account = harness.sessions.register(jane()).await?;
        assert_eq!(account.username, "janed");

        let (_, pair) = harness.sessions.login("janed", "s3cret!").await?;

        let wrong = harness.sessions.login("janed", "wrong").await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let rotated = harness.sessions.refresh(Some(&pair.refresh_token)).await?;
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        let replay = harness.sessions.refresh(Some(&pair.refresh_token)).await;
        assert!(matches!(replay, Err(AuthError::InvalidCredentials)));
        Ok(())
    }

    #[test]
    fn email_validation_accepts_and_rejects() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }
}
