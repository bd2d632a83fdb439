//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, media};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let media_opts = media::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        access_token_secret: auth_opts.access_token_secret,
        refresh_token_secret: auth_opts.refresh_token_secret,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        media_root: media_opts.media_root,
        public_base_url: media_opts.public_base_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_secrets_required() {
        temp_env::with_vars(
            [
                ("VIDRA_ACCESS_TOKEN_SECRET", None::<&str>),
                ("VIDRA_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
                (
                    "VIDRA_DSN",
                    Some("postgres://user@localhost:5432/vidra"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["vidra"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --access-token-secret"));
                }
            },
        );
    }

    #[test]
    fn full_argument_set_dispatches_to_server() {
        temp_env::with_vars(
            [
                ("VIDRA_ACCESS_TOKEN_SECRET", None::<&str>),
                ("VIDRA_REFRESH_TOKEN_SECRET", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "vidra",
                    "--dsn",
                    "postgres://user@localhost:5432/vidra",
                    "--access-token-secret",
                    "access-secret",
                    "--refresh-token-secret",
                    "refresh-secret",
                    "--port",
                    "9090",
                    "--media-root",
                    "/srv/media",
                ]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected server action");
                };
                assert_eq!(args.port, 9090);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/vidra");
                assert_eq!(args.access_token_secret, "access-secret");
                assert_eq!(args.refresh_token_secret, "refresh-secret");
                assert_eq!(args.access_token_ttl_seconds, 900);
                assert_eq!(args.refresh_token_ttl_seconds, 864_000);
                assert_eq!(args.media_root, "/srv/media");
                assert_eq!(args.public_base_url, "http://localhost:8080");
            },
        );
    }
}
