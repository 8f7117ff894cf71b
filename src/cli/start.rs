use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

fn get_verbosity_level(matches: &clap::ArgMatches) -> tracing::Level {
    match matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .map_or(0, |&v| v)
    {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Start the CLI
/// # Errors
/// Returns an error if logging cannot be initialized or arguments are invalid
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(Some(get_verbosity_level(&matches)))?;

    handler(&matches)
}
