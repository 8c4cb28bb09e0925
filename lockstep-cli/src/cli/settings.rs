//! Pipeline settings assembled from a JSON file and command-line overrides.

use std::fs;

use clap::ArgMatches;
use lockstep_lib::playback::settings::PipelineSettings;

use super::{parse_arg, CliError};

const MIB: usize = 1024 * 1024;

/// Build the settings for a playback run. Flags override the file.
pub fn from_args(args: &ArgMatches) -> Result<PipelineSettings, CliError> {
    let mut settings = match args.get_one::<String>("settings") {
        Some(path) => PipelineSettings::from_json(&fs::read_to_string(path)?)?,
        None => PipelineSettings::default(),
    };

    if let Some(mb) = parse_arg::<usize>(args, "max-queue-mb")? {
        settings.max_queue_bytes = mb.saturating_mul(MIB);
    }
    if let Some(packets) = parse_arg::<usize>(args, "min-packets")? {
        settings.min_queued_packets = packets;
    }

    Ok(settings.sanitized())
}

/// `lockstep create settings-json`
pub fn print_default() -> Result<i32, CliError> {
    println!("{}", PipelineSettings::default().to_json_pretty()?);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;
    use std::io::Write;

    #[test]
    fn flags_override_the_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_queued_packets": 40, "poll_interval_ms": 25}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = build_cli()
            .try_get_matches_from([
                "lockstep",
                "--settings",
                path.as_str(),
                "--max-queue-mb",
                "2",
                "clip.wav",
            ])
            .unwrap();
        let settings = from_args(&args).unwrap();
        assert_eq!(settings.max_queue_bytes, 2 * MIB);
        assert_eq!(settings.min_queued_packets, 40);
        assert_eq!(settings.poll_interval_ms, 25);
    }

    #[test]
    fn unreadable_settings_file_is_an_error() {
        let args = build_cli()
            .try_get_matches_from(["lockstep", "--settings", "/nonexistent/s.json", "clip.wav"])
            .unwrap();
        assert!(matches!(from_args(&args), Err(CliError::Io(_))));
    }
}
