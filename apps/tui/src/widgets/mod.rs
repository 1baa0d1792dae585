//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    Paragraph::new(format!(" {msg}")).style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// One-line text prompt with a cursor block.
pub(crate) fn prompt<'a>(label: &'a str, input: &'a str) -> Paragraph<'a> {
    Paragraph::new(Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(input),
        Span::styled(" ", Style::default().bg(Color::White)),
    ]))
}
