//! In-process log sink for the TUI.
//!
//! Lines are kept in a bounded ring that the log pane reads every frame.
//! `RUST_LOG` picks the level; `LOCKSTEP_LOG_STDERR` (anything but `0`)
//! mirrors each line to stderr, which is useful with `--quiet`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

const LOG_CAPACITY: usize = 500;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct RingLogger {
    level: LevelFilter,
    lines: LogBuffer,
    mirror: bool,
    started: Instant,
}

impl RingLogger {
    fn from_env() -> Self {
        let level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|value| value.trim().parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        let mirror = std::env::var_os("LOCKSTEP_LOG_STDERR").map_or(false, |value| value != "0");
        Self::new(level, mirror)
    }

    fn new(level: LevelFilter, mirror: bool) -> Self {
        Self {
            level,
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))),
            mirror,
            started: Instant::now(),
        }
    }

    /// `[  1.234s INFO  lockstep_lib::playback] message`
    fn format(&self, record: &Record) -> String {
        let target = record.target();
        // Keep the crate and first module only.
        let short = match target.match_indices("::").nth(1) {
            Some((end, _)) => &target[..end],
            None => target,
        };
        format!(
            "[{:>7.3}s {:<5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            short,
            record.args()
        )
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap();
        while lines.len() >= LOG_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        if self.mirror {
            eprintln!("{}", line);
        }
        self.push(line);
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<RingLogger> = OnceLock::new();

/// Install the logger (once per process) and return its line buffer.
pub fn init() -> LogBuffer {
    let logger = LOGGER.get_or_init(RingLogger::from_env);
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.level);
    }
    logger.lines.clone()
}

/// Last `count` lines of the buffer, oldest first.
pub fn tail(buffer: &LogBuffer, count: usize) -> Vec<String> {
    let buffer = buffer.lock().unwrap();
    let start = buffer.len().saturating_sub(count);
    buffer.iter().skip(start).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_line(logger: &RingLogger, level: log::Level, target: &str, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn ring_keeps_the_latest_lines() {
        let logger = RingLogger::new(LevelFilter::Info, false);
        for i in 0..(LOG_CAPACITY + 5) {
            record_line(&logger, log::Level::Info, "lockstep", &format!("line {}", i));
        }
        record_line(&logger, log::Level::Debug, "lockstep", "filtered");

        let lines = tail(&logger.lines, usize::MAX);
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert!(lines[0].ends_with("] line 5"));
        assert_eq!(tail(&logger.lines, 1).len(), 1);
        assert!(tail(&logger.lines, 1)[0].ends_with(&format!("line {}", LOG_CAPACITY + 4)));
    }

    #[test]
    fn lines_carry_level_and_short_target() {
        let logger = RingLogger::new(LevelFilter::Trace, false);
        record_line(
            &logger,
            log::Level::Warn,
            "lockstep_lib::playback::player::reconcile",
            "seek failed",
        );
        let line = tail(&logger.lines, 1).remove(0);
        assert!(line.starts_with('['));
        assert!(line.ends_with("s WARN  lockstep_lib::playback] seek failed"));
    }
}
