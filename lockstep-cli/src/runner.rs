use std::{
    io,
    sync::{Arc, Mutex},
    thread::sleep,
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use lockstep_lib::diagnostics::reporter::Report;
use lockstep_lib::media::{open_default_output, CountingSink, FrameSink, NullSink, RodioSink};
use lockstep_lib::playback::player::{MediaStatus, Player};
use log::{error, info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::cli::{self, parse_arg, CliError};
use crate::logging::{self, LogBuffer};
use crate::{controls, ui};

const REPORT_INTERVAL: Duration = Duration::from_millis(100);
const UI_TICK: Duration = Duration::from_millis(50);

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, CliError> {
    match args.subcommand() {
        Some(("info", sub)) => return cli::info::run(sub),
        Some(("create", sub)) => {
            if let Some(("settings-json", _)) = sub.subcommand() {
                return cli::settings::print_default();
            }
            return Ok(2);
        }
        _ => {}
    }

    info!("Starting Lockstep CLI");
    let input = args
        .get_one::<String>("INPUT")
        .ok_or(CliError::MissingInput)?
        .clone();
    let gain = parse_arg::<f32>(args, "gain")?.unwrap_or(70.0);
    let preroll_ms = parse_arg::<f32>(args, "preroll-ms")?.unwrap_or(0.0);
    let speed = parse_arg::<f64>(args, "speed")?;
    let start_ms = parse_arg::<i64>(args, "start-ms")?;
    let quiet = args.get_flag("quiet");
    let settings = cli::settings::from_args(args)?;

    lockstep_lib::init();

    // The stream has to outlive the sink connected to its mixer.
    let output = if args.get_flag("no-audio") {
        None
    } else {
        open_default_output()
    };
    let rodio_sink = output.as_ref().map(|stream| {
        let sink = RodioSink::connect(stream.mixer()).with_preroll_ms(preroll_ms);
        sink.set_volume(gain / 100.0);
        Arc::new(sink)
    });
    let audio_sink: Arc<dyn FrameSink> = match &rodio_sink {
        Some(sink) => sink.clone(),
        None => {
            if !args.get_flag("no-audio") {
                warn!("no audio output available, discarding audio");
            }
            Arc::new(NullSink)
        }
    };
    let video_sink = Arc::new(CountingSink::new());

    let player = Player::with_sinks(cli::backend_for(&input), video_sink.clone(), audio_sink);
    player.set_pipeline_settings(settings);
    if let Some(speed) = speed {
        player.set_speed(speed);
    }

    let latest: Arc<Mutex<Option<Report>>> = Arc::new(Mutex::new(None));
    let sink_latest = latest.clone();
    let reporting: Arc<Mutex<dyn Fn(Report) + Send>> =
        Arc::new(Mutex::new(move |report: Report| {
            *sink_latest.lock().unwrap() = Some(report);
        }));
    player.set_reporting(reporting, REPORT_INTERVAL);

    player.set_source(&input);
    player.play();

    let _raw_mode = if quiet { None } else { RawModeGuard::enable().ok() };
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };

    let mut pending_start = start_ms;
    let mut code = 0;
    loop {
        let status = player.media_status();
        match status {
            MediaStatus::EndOfMedia => {
                info!("reached end of {}", input);
                break;
            }
            MediaStatus::Invalid => {
                if let Some(err) = player.error() {
                    error!("{}", err);
                }
                code = 1;
                break;
            }
            MediaStatus::Loaded => {
                if let Some(start) = pending_start.take() {
                    player.seek(start);
                }
            }
            _ => {}
        }

        if let Some(term) = terminal.as_mut() {
            let report = latest.lock().unwrap().clone().unwrap_or_else(|| Report {
                position_ms: player.position(),
                duration_ms: player.duration(),
                state: player.state(),
                media_status: status,
                speed: player.speed(),
            });
            let snapshot = controls::status_text(controls::StatusArgs {
                report,
                video_frames: video_sink.frames(),
                audio_buffers: rodio_sink.as_ref().map(|sink| sink.queued()),
            });
            let log_height = term.size().map(|area| area.height as usize).unwrap_or(50);
            let log_lines = logging::tail(&log_buffer, log_height);
            ui::draw_status(term, &input, &snapshot, &log_lines);

            if !controls::handle_key_event(&player) {
                break;
            }
        }

        sleep(UI_TICK);
    }

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }

    drop(player);
    drop(rodio_sink);
    drop(output);
    lockstep_lib::shutdown();
    Ok(code)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
