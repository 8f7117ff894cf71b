use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_CLOCK_TOLERANCE_SECONDS: &str = "clock-tolerance-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_USER_LOGIN_PATH: &str = "user-login-path";
pub const ARG_ADMIN_LOGIN_PATH: &str = "admin-login-path";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Shared HS256 secret used to verify session tokens")
                .long_help(
                    "Shared HS256 secret used to verify session tokens. \
                     Without it every authenticated request fails with 500.",
                )
                .env("BIONE_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_CLOCK_TOLERANCE_SECONDS)
                .long(ARG_CLOCK_TOLERANCE_SECONDS)
                .help("Clock skew tolerated when checking token expiry")
                .env("BIONE_CLOCK_TOLERANCE_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark cookies Secure (serve over HTTPS)")
                .env("BIONE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_USER_LOGIN_PATH)
                .long(ARG_USER_LOGIN_PATH)
                .help("Login page for user portal redirects")
                .env("BIONE_USER_LOGIN_PATH")
                .default_value("/Login/hal-login"),
        )
        .arg(
            Arg::new(ARG_ADMIN_LOGIN_PATH)
                .long(ARG_ADMIN_LOGIN_PATH)
                .help("Login page for admin portal redirects")
                .env("BIONE_ADMIN_LOGIN_PATH")
                .default_value("/Signin/hal-signAdmin"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub session_secret: Option<SecretString>,
    pub clock_tolerance_seconds: i64,
    pub cookie_secure: bool,
    pub user_login_path: String,
    pub admin_login_path: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing from the matches.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            session_secret: matches
                .get_one::<String>(ARG_SESSION_SECRET)
                .cloned()
                .map(SecretString::from),
            clock_tolerance_seconds: matches
                .get_one::<i64>(ARG_CLOCK_TOLERANCE_SECONDS)
                .copied()
                .context("missing clock tolerance")?,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            user_login_path: matches
                .get_one::<String>(ARG_USER_LOGIN_PATH)
                .cloned()
                .context("missing user login path")?,
            admin_login_path: matches
                .get_one::<String>(ARG_ADMIN_LOGIN_PATH)
                .cloned()
                .context("missing admin login path")?,
        })
    }
}
