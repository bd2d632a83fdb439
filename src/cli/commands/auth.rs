use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_REFRESH_TOKEN_SECRET: &str = "refresh-token-secret";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("Signing secret for access tokens")
                .env("VIDRA_ACCESS_TOKEN_SECRET"),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_SECRET)
                .long(ARG_REFRESH_TOKEN_SECRET)
                .help("Signing secret for refresh tokens (must differ from the access secret)")
                .env("VIDRA_REFRESH_TOKEN_SECRET"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .env("VIDRA_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token lifetime in seconds")
                .env("VIDRA_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("864000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used for CORS and cookie flags")
                .env("VIDRA_FRONTEND_BASE_URL")
                .default_value("https://vidra.dev"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub frontend_base_url: String,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error when either token secret is missing; the service
    /// refuses to start without both.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let access_token_secret = matches
            .get_one::<String>(ARG_ACCESS_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --access-token-secret")?;
        let refresh_token_secret = matches
            .get_one::<String>(ARG_REFRESH_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --refresh-token-secret")?;

        Ok(Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .unwrap_or(900),
            refresh_token_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .unwrap_or(864_000),
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "https://vidra.dev".to_string()),
        })
    }
}
