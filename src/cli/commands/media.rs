use clap::{Arg, Command};

pub const ARG_MEDIA_ROOT: &str = "media-root";
pub const ARG_PUBLIC_BASE_URL: &str = "public-base-url";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MEDIA_ROOT)
                .long(ARG_MEDIA_ROOT)
                .help("Directory where uploaded media files are stored")
                .env("VIDRA_MEDIA_ROOT")
                .default_value("./media"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_BASE_URL)
                .long(ARG_PUBLIC_BASE_URL)
                .help("Public base URL under which stored media is served")
                .env("VIDRA_PUBLIC_BASE_URL")
                .default_value("http://localhost:8080"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub media_root: String,
    pub public_base_url: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &clap::ArgMatches) -> Self {
        Self {
            media_root: matches
                .get_one::<String>(ARG_MEDIA_ROOT)
                .cloned()
                .unwrap_or_else(|| "./media".to_string()),
            public_base_url: matches
                .get_one::<String>(ARG_PUBLIC_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
        }
    }
}
