use std::io::Stdout;

use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};

use crate::controls::StatusSnapshot;

const KEY_HINTS: [(&str, &str); 6] = [
    ("space", "play/pause"),
    (".", "step"),
    ("←/→", "seek 5s"),
    ("-/=", "speed"),
    ("s", "stop"),
    ("q", "quit"),
];

pub fn draw_status(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    source: &str,
    status: &StatusSnapshot,
    log_lines: &[String],
) {
    let _ = terminal.draw(|f| {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Min(3),
            ])
            .split(f.size());

        f.render_widget(key_hints(), rows[0]);
        draw_playback(f, rows[1], source, status);

        let progress = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(status.progress);
        f.render_widget(progress, rows[2]);

        draw_logs(f, rows[3], log_lines);
    });
}

fn key_hints() -> Paragraph<'static> {
    let mut spans = Vec::with_capacity(KEY_HINTS.len() * 2);
    for (key, action) in KEY_HINTS {
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default().fg(Color::Black).bg(Color::Blue),
        ));
        spans.push(Span::raw(format!(" {}  ", action)));
    }
    Paragraph::new(Line::from(spans))
}

fn draw_playback(f: &mut Frame, area: Rect, source: &str, status: &StatusSnapshot) {
    let widget = Paragraph::new(status.text.as_str())
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", source)),
        );
    f.render_widget(widget, area);
}

fn draw_logs(f: &mut Frame, area: Rect, log_lines: &[String]) {
    let visible = area.height.saturating_sub(2) as usize;
    let text = match log_lines.len() {
        0 => "No logs yet.".to_string(),
        len => log_lines[len.saturating_sub(visible)..].join("\n"),
    };
    let widget = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(" Logs "));
    f.render_widget(widget, area);
}
