//! The versions table.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use mastertable_table::{Column, SortDirection, SortState, TableViewModel};

/// Scroll position and collapse state of the versions table.
#[derive(Debug, Default)]
pub(crate) struct VersionsScreen {
    scroll: usize,
    collapsed: bool,
}

impl VersionsScreen {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn scroll(&self) -> usize {
        self.scroll
    }

    pub(crate) fn scroll_down(&mut self, visible: usize) {
        if self.scroll + 1 < visible {
            self.scroll += 1;
        }
    }

    pub(crate) fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    /// Back to the first row, e.g. after the row set changed.
    pub(crate) fn reset_scroll(&mut self) {
        self.scroll = 0;
    }

    pub(crate) fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub(crate) fn toggle_collapsed(&mut self) {
        self.collapsed = !self.collapsed;
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, title: &str, table: Option<&TableViewModel>) {
        let Some(table) = table else {
            let empty = Paragraph::new("No master open.\n\nPress 'g' and enter a master id or URL.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(" Versions "));
            f.render_widget(empty, area);
            return;
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {title} ({}/{}) ", table.visible_len(), table.len()));

        if self.is_collapsed() {
            let hint = Paragraph::new("Collapsed. Press 'c' to expand.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(hint, area);
            return;
        }

        if let Some(error) = table.error_row() {
            let row = Paragraph::new(error)
                .style(Style::default().fg(Color::Red))
                .block(block);
            f.render_widget(row, area);
            return;
        }

        let header = Row::new(header_cells(table.sort_state()))
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = table
            .visible_rows()
            .skip(self.scroll())
            .take(usize::from(area.height))
            .map(|row| Row::new(row.cells().map(Cell::from)))
            .collect();

        let widths = [
            Constraint::Percentage(55),
            Constraint::Percentage(20),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let view = Table::new(rows, widths).header(header).block(block);
        f.render_widget(view, area);
    }
}

/// Column headers, the sorted one marked with its direction.
pub(crate) fn header_cells(sort: Option<SortState>) -> [String; 4] {
    Column::ALL.map(|column| match sort {
        Some(s) if s.column == column => {
            let arrow = match s.direction {
                SortDirection::Ascending => '▲',
                SortDirection::Descending => '▼',
            };
            format!("{} {arrow}", column.header())
        }
        _ => column.header().to_string(),
    })
}
