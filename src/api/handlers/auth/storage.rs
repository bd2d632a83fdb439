//! Durable account storage.
//!
//! The store owns persistence only: lookups, unique-constrained creation,
//! and the single refresh-token slot. Uniqueness of username/email is
//! enforced by the database's unique indexes (SQLSTATE 23505), not by a
//! pre-check in application code, and refresh rotation is a compare-and-swap
//! so two racing renewals resolve to exactly one winner.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::error::AuthError;

/// A stored account row. `secret_hash` and `refresh_token` never leave the
/// auth module; API responses are built from [`super::types::AccountResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub secret_hash: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create an account. Identity fields arrive already
/// normalized (lowercased, trimmed) from the session layer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub secret_hash: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an account whose username OR email equals `identity`.
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError>;

    /// Insert a new account. Fails with `DuplicateIdentity` when username or
    /// email collides; the check is atomic with the insert.
    async fn create(&self, account: NewAccount) -> Result<Account, AuthError>;

    /// Overwrite the refresh-token slot. `None` clears it (logout); the
    /// write is idempotent.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), AuthError>;

    /// Atomically replace the refresh-token slot, but only if it still holds
    /// `presented`. Returns `false` when the slot changed underneath the
    /// caller (rotated away, cleared by logout, or a lost race).
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented: &str,
        next: &str,
    ) -> Result<bool, AuthError>;

    /// Update profile fields. Fails with `DuplicateIdentity` when the new
    /// email collides with another account.
    async fn update_profile(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<Account>, AuthError>;

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<Option<Account>, AuthError>;

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<Option<Account>, AuthError>;

    /// Replace the secret digest and clear the refresh-token slot in one
    /// statement, so a stolen refresh token dies with the old secret.
    async fn replace_secret(&self, id: Uuid, digest: &str) -> Result<(), AuthError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = r#"
    id,
    full_name,
    username,
    email,
    secret_hash,
    avatar_url,
    cover_image_url,
    refresh_token,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

fn row_to_account(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        full_name: row.get("full_name"),
        username: row.get("username"),
        email: row.get("email"),
        secret_hash: row.get("secret_hash"),
        avatar_url: row.get("avatar_url"),
        cover_image_url: row.get("cover_image_url"),
        refresh_token: row.get("refresh_token"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, AuthError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1 OR email = $1 LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup account by identity")?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup account by id")?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn create(&self, account: NewAccount) -> Result<Account, AuthError> {
        let query = format!(
            r"
            INSERT INTO accounts
                (full_name, username, email, secret_hash, avatar_url, cover_image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let result = sqlx::query(&query)
            .bind(&account.full_name)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.secret_hash)
            .bind(&account.avatar_url)
            .bind(&account.cover_image_url)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match result {
            Ok(row) => Ok(row_to_account(&row)),
            Err(err) if is_unique_violation(&err) => Err(AuthError::DuplicateIdentity),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert account")
                .into()),
        }
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), AuthError> {
        let query = "UPDATE accounts SET refresh_token = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to write refresh token slot")?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented: &str,
        next: &str,
    ) -> Result<bool, AuthError> {
        // The WHERE clause is the replay check: a slot that no longer holds
        // the presented value rejects the rotation.
        let query = r"
            UPDATE accounts
            SET refresh_token = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token = $2
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(presented)
            .bind(next)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to rotate refresh token")?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<Account>, AuthError> {
        let query = format!(
            r"
            UPDATE accounts
            SET full_name = $2, email = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(full_name)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await;

        match result {
            Ok(row) => Ok(row.as_ref().map(row_to_account)),
            Err(err) if is_unique_violation(&err) => Err(AuthError::DuplicateIdentity),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to update profile")
                .into()),
        }
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<Option<Account>, AuthError> {
        let query = format!(
            r"
            UPDATE accounts
            SET avatar_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(url)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update avatar")?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<Option<Account>, AuthError> {
        let query = format!(
            r"
            UPDATE accounts
            SET cover_image_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(url)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update cover image")?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn replace_secret(&self, id: Uuid, digest: &str) -> Result<(), AuthError> {
        let query = r"
            UPDATE accounts
            SET secret_hash = $2, refresh_token = NULL, updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(digest)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to replace secret digest")?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store used by unit tests. Mirrors the Postgres semantics
    //! the session layer depends on: unique identities and CAS rotation.

    use super::{Account, AuthError, CredentialStore, NewAccount};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

    #[derive(Default)]
    pub(crate) struct MemoryCredentialStore {
        accounts: Mutex<Vec<Account>>,
    }

    impl MemoryCredentialStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn len(&self) -> usize {
            self.accounts.lock().expect("store lock").len()
        }

        pub(crate) fn stored_refresh_token(&self, id: Uuid) -> Option<String> {
            self.accounts
                .lock()
                .expect("store lock")
                .iter()
                .find(|account| account.id == id)
                .and_then(|account| account.refresh_token.clone())
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, AuthError> {
            let accounts = self.accounts.lock().expect("store lock");
            Ok(accounts
                .iter()
                .find(|account| account.username == identity || account.email == identity)
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError> {
            let accounts = self.accounts.lock().expect("store lock");
            Ok(accounts.iter().find(|account| account.id == id).cloned())
        }

        async fn create(&self, account: NewAccount) -> Result<Account, AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            let collides = accounts.iter().any(|existing| {
                existing.username == account.username || existing.email == account.email
            });
            if collides {
                return Err(AuthError::DuplicateIdentity);
            }
            let created = Account {
                id: Uuid::new_v4(),
                full_name: account.full_name,
                username: account.username,
                email: account.email,
                secret_hash: account.secret_hash,
                avatar_url: account.avatar_url,
                cover_image_url: account.cover_image_url,
                refresh_token: None,
                created_at: FIXED_TIMESTAMP.to_string(),
                updated_at: FIXED_TIMESTAMP.to_string(),
            };
            accounts.push(created.clone());
            Ok(created)
        }

        async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            if let Some(account) = accounts.iter_mut().find(|account| account.id == id) {
                account.refresh_token = token.map(ToString::to_string);
            }
            Ok(())
        }

        async fn rotate_refresh_token(
            &self,
            id: Uuid,
            presented: &str,
            next: &str,
        ) -> Result<bool, AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            let Some(account) = accounts.iter_mut().find(|account| account.id == id) else {
                return Ok(false);
            };
            if account.refresh_token.as_deref() != Some(presented) {
                return Ok(false);
            }
            account.refresh_token = Some(next.to_string());
            Ok(true)
        }

        async fn update_profile(
            &self,
            id: Uuid,
            full_name: &str,
            email: &str,
        ) -> Result<Option<Account>, AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            let collides = accounts
                .iter()
                .any(|account| account.id != id && account.email == email);
            if collides {
                return Err(AuthError::DuplicateIdentity);
            }
            let Some(account) = accounts.iter_mut().find(|account| account.id == id) else {
                return Ok(None);
            };
            account.full_name = full_name.to_string();
            account.email = email.to_string();
            Ok(Some(account.clone()))
        }

        async fn update_avatar(&self, id: Uuid, url: &str) -> Result<Option<Account>, AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            let Some(account) = accounts.iter_mut().find(|account| account.id == id) else {
                return Ok(None);
            };
            account.avatar_url = url.to_string();
            Ok(Some(account.clone()))
        }

        async fn update_cover_image(
            &self,
            id: Uuid,
            url: &str,
        ) -> Result<Option<Account>, AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            let Some(account) = accounts.iter_mut().find(|account| account.id == id) else {
                return Ok(None);
            };
            account.cover_image_url = Some(url.to_string());
            Ok(Some(account.clone()))
        }

        async fn replace_secret(&self, id: Uuid, digest: &str) -> Result<(), AuthError> {
            let mut accounts = self.accounts.lock().expect("store lock");
            if let Some(account) = accounts.iter_mut().find(|account| account.id == id) {
                account.secret_hash = digest.to_string();
                account.refresh_token = None;
            }
            Ok(())
        }
    }
}
