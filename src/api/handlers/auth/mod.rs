//! Credential and session subsystem.
//!
//! Layering, leaves first: [`secret`] hashes and verifies account secrets,
//! [`token`] mints and verifies the signed access/refresh pair, [`storage`]
//! persists accounts and the single refresh-token slot, and [`service`]
//! orchestrates the four lifecycle operations on top of them. Everything
//! above that ([`register`], [`login`], [`session`], [`password`]) is axum
//! plumbing that translates between HTTP and the typed core.

pub mod cookies;
pub mod login;
pub mod password;
pub mod principal;
pub mod register;
pub mod secret;
pub mod service;
pub mod session;
pub mod state;
pub mod storage;
pub mod token;
pub mod types;

pub use state::{AuthConfig, AuthState};
