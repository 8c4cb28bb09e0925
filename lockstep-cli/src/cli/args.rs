//! CLI argument definitions for `lockstep`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("lockstep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play media with synchronized audio and video clocks")
        .arg_required_else_help(true)
        .arg(
            Arg::new("speed")
                .long("speed")
                .value_name("RATE")
                .help("Initial playback rate (1.0 = normal)"),
        )
        .arg(
            Arg::new("start-ms")
                .long("start-ms")
                .value_name("MS")
                .help("Seek to the given position once the source has loaded"),
        )
        .arg(
            Arg::new("gain")
                .long("gain")
                .short('g')
                .value_name("GAIN")
                .default_value("70")
                .help("The playback gain (0-100)"),
        )
        .arg(
            Arg::new("settings")
                .long("settings")
                .short('S')
                .value_name("PATH")
                .help("Path to a pipeline settings JSON file"),
        )
        .arg(
            Arg::new("max-queue-mb")
                .long("max-queue-mb")
                .value_name("MB")
                .help("Combined queue size in MiB that pauses reading"),
        )
        .arg(
            Arg::new("min-packets")
                .long("min-packets")
                .value_name("COUNT")
                .help("Packets a queue must hold before reading pauses"),
        )
        .arg(
            Arg::new("preroll-ms")
                .long("preroll-ms")
                .value_name("MS")
                .default_value("20")
                .help("Silence (ms) queued on the audio device before the first frame"),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .action(ArgAction::SetTrue)
                .help("Discard audio frames instead of opening the output device"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Do not draw the terminal UI"),
        )
        .arg(
            Arg::new("INPUT")
                .help("The input file path or synthetic:// URL")
                .required(false)
                .index(1),
        )
        .subcommand(
            Command::new("info")
                .about("Open a source and display its stream layout")
                .arg(
                    Arg::new("INPUT")
                        .help("The input file path or synthetic:// URL")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("print")
                        .long("print")
                        .action(ArgAction::SetTrue)
                        .help("Print info to stdout instead of opening the TUI"),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand_required(true)
                .subcommand(
                    Command::new("settings-json")
                        .about("Print the default pipeline settings as JSON"),
                ),
        )
}
