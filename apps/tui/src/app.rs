//! Core TUI application state and event loop.

use std::io;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use mastertable_catalog::parent_id_from_location;
use mastertable_core::{PipelineController, RunPhase, ViewChange, ViewChangeOutcome};
use mastertable_table::{Column, SortDirection};

use crate::screens::VersionsScreen;
use crate::widgets::{prompt, status_bar};

/// Pause between frames; pipeline tasks run while the loop sleeps.
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// What keystrokes currently edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    Normal,
    /// Typing a master id or URL.
    OpenMaster(String),
    /// Typing a live filter query.
    Filter(String),
}

/// Application state.
pub(crate) struct App {
    pub controller: PipelineController,
    pub site_url: String,
    pub mode: Mode,
    pub screen: VersionsScreen,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
}

impl App {
    pub(crate) fn new(controller: PipelineController, site_url: String) -> Self {
        Self {
            controller,
            site_url,
            mode: Mode::Normal,
            screen: VersionsScreen::new(),
            should_quit: false,
            status: "Ready, press ? for help".to_string(),
            show_help: false,
        }
    }

    /// Open the master named by `location` (id or URL).
    pub(crate) fn open(&mut self, location: &str) {
        let Some(parent) = parent_id_from_location(location) else {
            self.status = format!("'{location}' is not a master id or URL");
            return;
        };
        let outcome = self.controller.on_view_changed(ViewChange {
            parent_id: Some(parent),
            table_present: true,
            display_year: None,
        });
        self.after_view_change(outcome);
    }

    /// Rebuild the table of the current master from scratch.
    fn reload(&mut self) {
        let Some(parent) = self.controller.parent_id() else {
            self.status = "Nothing to reload".to_string();
            return;
        };
        let outcome = self.controller.on_view_changed(ViewChange {
            parent_id: Some(parent),
            table_present: false,
            display_year: None,
        });
        self.after_view_change(outcome);
    }

    fn after_view_change(&mut self, outcome: ViewChangeOutcome) {
        match outcome {
            ViewChangeOutcome::Restarted => {
                self.screen.reset_scroll();
                if let Some(parent) = self.controller.parent_id() {
                    self.status = format!("Loading master {parent}");
                }
            }
            ViewChangeOutcome::Ignored => {
                self.status = "Already showing this master".to_string();
            }
            ViewChangeOutcome::Cleared => {
                self.screen.reset_scroll();
                self.status = "Cleared".to_string();
            }
        }
    }

    fn sort(&mut self, index: usize) {
        let Some(table) = self.controller.table() else {
            return;
        };
        if let Some(state) = table.with(|t| t.sort_by(index)) {
            let dir = match state.direction {
                SortDirection::Ascending => "ascending",
                SortDirection::Descending => "descending",
            };
            self.status = format!("Sorted by {} ({dir})", state.column);
            self.screen.reset_scroll();
        }
    }

    fn apply_filter(&mut self, query: &str) {
        if let Some(table) = self.controller.table() {
            table.with(|t| t.filter(query));
            self.screen.reset_scroll();
        }
    }

    fn visible_len(&self) -> usize {
        self.controller
            .table()
            .map(|t| t.with(|t| t.visible_len()))
            .unwrap_or(0)
    }

    /// Status line reflecting the run, unless a message is pending.
    fn progress_line(&self) -> Option<String> {
        let state = self.controller.state()?;
        let table = self.controller.table()?;
        let (loaded, total) = table.with(|t| (t.loaded_len(), t.len()));
        match state.phase {
            RunPhase::Running if total == 0 => {
                Some(format!("Listing versions of master {}...", state.parent_id))
            }
            RunPhase::Running => Some(format!("Fetching release details {loaded}/{total}")),
            _ => None,
        }
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) async fn run(
    controller: PipelineController,
    site_url: String,
    initial: Option<String>,
) -> Result<()> {
    let mut app = App::new(controller, site_url);
    if let Some(location) = initial {
        app.open(&location);
    }

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        // The error row has now been shown.
        if matches!(app.controller.phase(), RunPhase::Failed(_)) {
            app.controller.acknowledge_error();
            app.status = "Could not list versions, press r to retry".to_string();
        }

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            break;
        }

        tokio::time::sleep(FRAME_INTERVAL).await;
    }

    Ok(())
}

pub(crate) fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if let KeyCode::Char('c') = code {
        if modifiers.contains(KeyModifiers::CONTROL) {
            app.should_quit = true;
            return;
        }
    }

    match std::mem::replace(&mut app.mode, Mode::Normal) {
        Mode::OpenMaster(input) => handle_open_key(app, input, code),
        Mode::Filter(input) => handle_filter_key(app, input, code),
        Mode::Normal => handle_normal_key(app, code),
    }
}

fn handle_open_key(app: &mut App, mut input: String, code: KeyCode) {
    match code {
        KeyCode::Enter => app.open(input.trim()),
        KeyCode::Esc => app.status = "Cancelled".to_string(),
        KeyCode::Backspace => {
            input.pop();
            app.mode = Mode::OpenMaster(input);
        }
        KeyCode::Char(c) => {
            input.push(c);
            app.mode = Mode::OpenMaster(input);
        }
        _ => app.mode = Mode::OpenMaster(input),
    }
}

/// Every keystroke re-filters.
fn handle_filter_key(app: &mut App, mut input: String, code: KeyCode) {
    match code {
        KeyCode::Enter => {
            app.status = format!("{} rows match", app.visible_len());
        }
        KeyCode::Esc => {
            app.apply_filter("");
            app.status = "Filter cleared".to_string();
        }
        KeyCode::Backspace => {
            input.pop();
            app.apply_filter(&input);
            app.mode = Mode::Filter(input);
        }
        KeyCode::Char(c) => {
            input.push(c);
            app.apply_filter(&input);
            app.mode = Mode::Filter(input);
        }
        _ => app.mode = Mode::Filter(input),
    }
}

fn handle_normal_key(app: &mut App, code: KeyCode) {
    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('g') => app.mode = Mode::OpenMaster(String::new()),
        KeyCode::Char('/') => {
            let current = app
                .controller
                .table()
                .map(|t| t.with(|t| t.query().to_string()))
                .unwrap_or_default();
            app.mode = Mode::Filter(current);
        }
        KeyCode::Char(c @ '1'..='4') => app.sort(c as usize - '1' as usize),
        KeyCode::Char('c') => app.screen.toggle_collapsed(),
        KeyCode::Char('r') => app.reload(),
        KeyCode::Down | KeyCode::Char('j') => {
            let visible = app.visible_len();
            app.screen.scroll_down(visible);
        }
        KeyCode::Up | KeyCode::Char('k') => app.screen.scroll_up(),
        _ => {}
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Table
            Constraint::Length(1), // Prompt / status
        ])
        .split(f.area());

    let title = match app.controller.parent_id() {
        Some(parent) => format!("Versions of master {parent}"),
        None => "Versions".to_string(),
    };
    match app.controller.table() {
        Some(table) => table.with(|t| app.screen.draw(f, chunks[0], &title, Some(t))),
        None => app.screen.draw(f, chunks[0], &title, None),
    }

    match &app.mode {
        Mode::OpenMaster(input) => f.render_widget(prompt("Open master: ", input), chunks[1]),
        Mode::Filter(input) => f.render_widget(prompt("Filter: ", input), chunks[1]),
        Mode::Normal => {
            let line = app.progress_line().unwrap_or_else(|| app.status.clone());
            f.render_widget(status_bar(&line), chunks[1]);
        }
    }

    if app.show_help {
        draw_help_overlay(f, &app.site_url);
    }
}

fn draw_help_overlay(f: &mut Frame, site_url: &str) {
    let area = centered_rect(60, 60, f.area());

    let mut help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  g            Open a master (id or URL)"),
        Line::from("  /            Filter rows (Esc clears)"),
    ];
    help_text.extend(
        Column::ALL
            .iter()
            .map(|c| Line::from(format!("  {}            Sort by {c}", c.index() + 1))),
    );
    help_text.extend([
        Line::from("  c            Collapse / expand table"),
        Line::from("  r            Reload current master"),
        Line::from("  ↑/↓ j/k      Scroll"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from(format!("Data from {site_url}")).style(Style::default().fg(Color::Gray)),
    ]);

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help, press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
