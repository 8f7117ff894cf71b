use crate::cli::{
    actions::{Action, server::Args},
    commands::auth::Options,
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let auth = Options::parse(matches)?;

    Ok(Action::Server(Args { port, dsn, auth }))
}
