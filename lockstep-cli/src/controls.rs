use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use lockstep_lib::diagnostics::reporter::Report;
use lockstep_lib::playback::player::{MediaStatus, Player, PlayerState};

const SEEK_STEP_MS: i64 = 5_000;
const SPEED_STEP: f64 = 0.25;
const MIN_SPEED: f64 = 0.25;
const MAX_SPEED: f64 = 4.0;

pub struct StatusSnapshot {
    pub text: String,
    /// Playback progress in `0.0..=1.0`.
    pub progress: f64,
}

pub struct StatusArgs {
    pub report: Report,
    pub video_frames: u64,
    pub audio_buffers: Option<usize>,
}

pub fn status_text(args: StatusArgs) -> StatusSnapshot {
    let report = &args.report;
    let state = match (report.state, report.media_status) {
        (_, MediaStatus::Loading) => "… Loading",
        (_, MediaStatus::Seeking) => "… Seeking",
        (_, MediaStatus::EndOfMedia) => "■ Ended",
        (PlayerState::Playing, _) => "▶ Playing",
        (PlayerState::Paused, _) => "⏸ Paused",
        (PlayerState::Stopped, _) => "■ Stopped",
    };
    let current = format_time(report.position_ms);
    let total = format_time(report.duration_ms);
    let progress = if report.duration_ms > 0 {
        (report.position_ms as f64 / report.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let audio = match args.audio_buffers {
        Some(buffers) => format!("{} queued", buffers),
        None => "off".to_string(),
    };
    let text = format!(
        "{}   {} / {}   ({:>5.1}%)\nSpeed: {:.2}x | video frames: {} | audio: {}",
        state,
        current,
        total,
        progress * 100.0,
        report.speed,
        args.video_frames,
        audio
    );

    StatusSnapshot { text, progress }
}

/// Poll for one key press and apply it. Returns false when the user quits.
pub fn handle_key_event(player: &Player) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            match key.code {
                KeyCode::Char('q') => {
                    player.stop();
                    return false;
                }
                KeyCode::Char(' ') => {
                    if player.state() == PlayerState::Playing {
                        player.pause();
                    } else {
                        player.play();
                    }
                }
                KeyCode::Char('.') => player.step_forward(),
                KeyCode::Char('s') | KeyCode::Char('S') => player.stop(),
                KeyCode::Left => {
                    let target = (player.position() - SEEK_STEP_MS).max(0);
                    player.seek(target);
                }
                KeyCode::Right => {
                    let target = player.position() + SEEK_STEP_MS;
                    player.seek(target);
                }
                KeyCode::Char('-') => player.set_speed(next_speed(player.speed(), -SPEED_STEP)),
                KeyCode::Char('=') | KeyCode::Char('+') => {
                    player.set_speed(next_speed(player.speed(), SPEED_STEP))
                }
                _ => {}
            }
        }
    }

    true
}

fn next_speed(current: f64, step: f64) -> f64 {
    (current + step).clamp(MIN_SPEED, MAX_SPEED)
}

fn format_time(ms: i64) -> String {
    let seconds = (ms.max(0) as f64 / 1000.0).floor() as u64;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(state: PlayerState, media_status: MediaStatus) -> Report {
        Report {
            position_ms: 61_500,
            duration_ms: 123_000,
            state,
            media_status,
            speed: 1.5,
        }
    }

    #[test]
    fn status_text_shows_progress_and_speed() {
        let status = status_text(StatusArgs {
            report: report(PlayerState::Playing, MediaStatus::Loaded),
            video_frames: 12,
            audio_buffers: None,
        });
        assert!(status.text.starts_with("▶ Playing   00:01:01 / 00:02:03"));
        assert!(status.text.contains("( 50.0%)"));
        assert_eq!(status.progress, 0.5);
        assert!(status.text.contains("Speed: 1.50x | video frames: 12 | audio: off"));
    }

    #[test]
    fn media_status_takes_precedence_over_transport() {
        let status = status_text(StatusArgs {
            report: report(PlayerState::Playing, MediaStatus::Seeking),
            video_frames: 0,
            audio_buffers: Some(3),
        });
        assert!(status.text.starts_with("… Seeking"));
        assert!(status.text.ends_with("audio: 3 queued"));
    }

    #[test]
    fn speed_steps_are_clamped() {
        assert_eq!(next_speed(1.0, SPEED_STEP), 1.25);
        assert_eq!(next_speed(0.25, -SPEED_STEP), MIN_SPEED);
        assert_eq!(next_speed(4.0, SPEED_STEP), MAX_SPEED);
    }
}
