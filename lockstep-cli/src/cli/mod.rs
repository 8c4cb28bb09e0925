//! Argument parsing and the non-playback subcommands.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use clap::ArgMatches;
use lockstep_lib::error::MediaError;
use lockstep_lib::media::{MediaBackend, SymphoniaBackend, SyntheticBackend};

pub mod args;
pub mod info;
pub mod settings;

/// Failure reported by the CLI before or outside playback.
#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    Settings(serde_json::Error),
    Media(MediaError),
    InvalidArgument { name: String, value: String },
    MissingInput,
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Settings(err) => write!(f, "invalid settings json: {}", err),
            Self::Media(err) => write!(f, "{}", err),
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid value '{}' for --{}", value, name)
            }
            Self::MissingInput => write!(f, "no input given"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Settings(value)
    }
}

impl From<MediaError> for CliError {
    fn from(value: MediaError) -> Self {
        Self::Media(value)
    }
}

/// Parse an optional argument, reporting unparsable values by name.
pub fn parse_arg<T: FromStr>(args: &ArgMatches, name: &str) -> Result<Option<T>, CliError> {
    match args.get_one::<String>(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CliError::InvalidArgument {
                name: name.to_string(),
                value: value.clone(),
            }),
        None => Ok(None),
    }
}

/// Pick the backend able to open `input`.
pub fn backend_for(input: &str) -> Arc<dyn MediaBackend> {
    if input.starts_with("synthetic://") {
        Arc::new(SyntheticBackend::new())
    } else {
        Arc::new(SymphoniaBackend::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arg_names_the_bad_flag() {
        let matches = args::build_cli()
            .try_get_matches_from(["lockstep", "--speed", "fast", "synthetic://?audio_ms=10"])
            .expect("arguments parse");
        let err = parse_arg::<f64>(&matches, "speed").unwrap_err();
        assert_eq!(err.to_string(), "invalid value 'fast' for --speed");
        assert_eq!(parse_arg::<u64>(&matches, "start-ms").unwrap(), None);
    }
}
