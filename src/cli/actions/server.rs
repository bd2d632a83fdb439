use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::api::media::FsMediaStore;
use anyhow::Result;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub media_root: String,
    pub public_base_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is unusable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(
        SecretString::from(args.access_token_secret),
        SecretString::from(args.refresh_token_secret),
    )
    .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
    .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
    .with_frontend_base_url(args.frontend_base_url);

    debug!("Auth config: {:?}", auth_config);

    let media = Arc::new(FsMediaStore::new(
        PathBuf::from(args.media_root),
        args.public_base_url,
    ));

    api::new(args.port, args.dsn, auth_config, media).await
}
