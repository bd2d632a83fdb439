//! # Vidra (Account & Session Service)
//!
//! `vidra` is the account authority for a multi-user media platform. It
//! registers accounts, verifies passwords, and issues a signed pair of
//! session tokens that is rotated on every renewal.
//!
//! ## Identity Model
//!
//! - **Normalization:** usernames and emails are lowercased and trimmed
//!   before storage and lookup; both are unique across all accounts.
//! - **Secrets:** only a bcrypt digest of the password is stored, and no API
//!   response ever carries the digest or the stored refresh token.
//!
//! ## Sessions
//!
//! A session is the pair of HS256 tokens returned by login: a short-lived
//! access token presented on every request, and a long-lived refresh token
//! mirrored in a single per-account storage slot. Redeeming a refresh token
//! mints a brand-new pair and rotates the slot with a compare-and-swap, so a
//! superseded token is permanently rejected even though its signature still
//! verifies. Logout clears the slot; changing the password does too.
//!
//! The two token classes are signed with distinct secrets: a leaked access
//! secret must not allow forging refresh tokens.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
