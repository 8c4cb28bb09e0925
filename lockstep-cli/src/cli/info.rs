//! `lockstep info`: open a source and show what the pipeline would play.

use std::io;
use std::time::Duration;

use clap::ArgMatches;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use lockstep_lib::media::{Interrupt, MediaInfo};
use ratatui::{
    backend::CrosstermBackend,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};

use super::{backend_for, CliError};

pub fn run(args: &ArgMatches) -> Result<i32, CliError> {
    let input = args
        .get_one::<String>("INPUT")
        .ok_or(CliError::MissingInput)?;
    lockstep_lib::init();
    let opened = backend_for(input).open(input, &Interrupt::new());
    lockstep_lib::shutdown();
    let lines = describe(input, &opened?.info);

    if args.get_flag("print") {
        for line in &lines {
            println!("{}", line);
        }
        return Ok(0);
    }

    show(&lines)?;
    Ok(0)
}

/// Human-readable summary of the stream layout.
pub fn describe(input: &str, info: &MediaInfo) -> Vec<String> {
    let stream = |index: Option<usize>, interval: Option<f64>| match (index, interval) {
        (Some(index), Some(interval)) if interval > 0.0 => {
            format!("#{} ({:.3}s frames, {:.2}/s)", index, interval, 1.0 / interval)
        }
        (Some(index), _) => format!("#{}", index),
        (None, _) => "none".to_string(),
    };

    vec![
        format!("Source:   {}", input),
        format!("Duration: {} ms", info.duration_ms()),
        format!("Seekable: {}", if info.seekable { "yes" } else { "no" }),
        format!(
            "Video:    {}",
            stream(info.video_stream, info.video_frame_interval)
        ),
        format!(
            "Audio:    {}",
            stream(info.audio_stream, info.audio_frame_interval)
        ),
    ]
}

fn show(lines: &[String]) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let text = format!("{}\n\npress any key to exit", lines.join("\n"));
    let result = (|| -> io::Result<()> {
        loop {
            terminal.draw(|f| {
                let widget = Paragraph::new(text.as_str())
                    .style(Style::default().fg(Color::Green))
                    .block(Block::default().borders(Borders::ALL).title("Media info"));
                f.render_widget(widget, f.size());
            })?;
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        return Ok(());
                    }
                }
            }
        }
    })();

    let _ = terminal.show_cursor();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show);
    let _ = terminal::disable_raw_mode();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_both_streams() {
        let info = MediaInfo {
            video_stream: Some(0),
            audio_stream: Some(1),
            duration: 2.5,
            seekable: true,
            video_frame_interval: Some(0.04),
            audio_frame_interval: Some(0.02),
        };
        let lines = describe("synthetic://?audio_ms=2500&video_ms=2500", &info);
        assert_eq!(lines[1], "Duration: 2500 ms");
        assert_eq!(lines[3], "Video:    #0 (0.040s frames, 25.00/s)");
        assert!(lines[4].starts_with("Audio:    #1"));
    }

    #[test]
    fn describe_marks_missing_streams() {
        let info = MediaInfo {
            video_stream: None,
            audio_stream: Some(0),
            duration: 0.0,
            seekable: false,
            video_frame_interval: None,
            audio_frame_interval: None,
        };
        let lines = describe("clip.wav", &info);
        assert_eq!(lines[2], "Seekable: no");
        assert_eq!(lines[3], "Video:    none");
        assert_eq!(lines[4], "Audio:    #0");
    }
}
