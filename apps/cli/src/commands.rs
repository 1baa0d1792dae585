//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mastertable_catalog::{CatalogClient, display_year_from_html, parent_id_from_location};
use mastertable_core::{ProgressReporter, RunOutcome, RunRequest, RunSummary, run_pipeline};
use mastertable_shared::{AppConfig, PipelineConfig, init_config, load_config};
use mastertable_table::{Column, SharedTable, SortDirection, TableViewModel};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MasterTable: all versions of a master release in one sortable table.
#[derive(Parser)]
#[command(
    name = "mastertable",
    version,
    about = "List every version of a Discogs master release with year and track count.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Table output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Sortable columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum SortKey {
    Release,
    Country,
    Year,
    Tracks,
}

impl From<SortKey> for Column {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Release => Column::Release,
            SortKey::Country => Column::Country,
            SortKey::Year => Column::Year,
            SortKey::Tracks => Column::Tracks,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch and print the versions table of one master release.
    Show {
        /// Master id, or a master page URL.
        master: String,

        /// Saved master page; its displayed year is used for releases without one.
        #[arg(long)]
        html: Option<PathBuf>,

        /// Column to sort by.
        #[arg(long, value_enum)]
        sort: Option<SortKey>,

        /// Sort descending.
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Only show rows containing this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Items per listing page (1-100).
        #[arg(long)]
        per_page: Option<u32>,

        /// Concurrent detail requests per batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between batches, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Arguments of `show`, after parsing.
struct ShowArgs {
    master: String,
    html: Option<PathBuf>,
    sort: Option<SortKey>,
    desc: bool,
    filter: Option<String>,
    format: OutputFormat,
    per_page: Option<u32>,
    batch_size: Option<usize>,
    delay_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mastertable=info",
        1 => "mastertable=debug",
        _ => "mastertable=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Show {
            master,
            html,
            sort,
            desc,
            filter,
            format,
            per_page,
            batch_size,
            delay_ms,
        } => {
            cmd_show(ShowArgs {
                master,
                html,
                sort,
                desc,
                filter,
                format,
                per_page,
                batch_size,
                delay_ms,
            })
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn cmd_show(args: ShowArgs) -> Result<()> {
    let config = load_config()?;

    let parent = parent_id_from_location(&args.master)
        .ok_or_else(|| eyre!("'{}' is neither a master id nor a master URL", args.master))?;

    let mut pipeline = PipelineConfig::from(&config);
    if let Some(per_page) = args.per_page {
        pipeline.per_page = per_page;
    }
    if let Some(batch_size) = args.batch_size {
        pipeline.batch_size = batch_size;
    }
    if let Some(delay) = args.delay_ms {
        pipeline.batch_delay = Duration::from_millis(delay);
    }
    pipeline.validate()?;

    let fallback_year = match &args.html {
        Some(path) => read_display_year(path)?,
        None => None,
    };

    let client = CatalogClient::new(&config.api)?;
    let table = SharedTable::default();
    if let Some(query) = &args.filter {
        table.with(|t| t.filter(query));
    }

    let site_url = pipeline.site_url.clone();
    let request = RunRequest::new(parent, fallback_year, pipeline);
    info!(%parent, run_id = %request.run_id, "showing master versions");

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, abandoning run");
                cancel.cancel();
            }
        })
    };

    let reporter = CliProgress::new();
    let summary = run_pipeline(&client, &request, &table, &cancel, &reporter).await;
    interrupt.abort();

    match &summary.outcome {
        RunOutcome::Completed => {}
        RunOutcome::Cancelled => return Err(eyre!("run cancelled")),
        RunOutcome::Failed(message) => {
            let row = table.with(|t| t.error_row()).unwrap_or_default();
            match args.format {
                OutputFormat::Text => println!("{row}"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "error": message }))?
                ),
            }
            return Err(eyre!("could not list versions of master {parent}"));
        }
    }

    // Year and track cells are only known now.
    if let Some(key) = args.sort {
        table.with(|t| sort_finished(t, key, args.desc));
    }

    let output = table.with(|t| match args.format {
        OutputFormat::Text => Ok(render_text(t)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&render_json(t, &summary, &site_url, Utc::now()))
        }
    })?;
    println!("{output}");

    Ok(())
}

/// Sort a fully enriched table by `key`.
fn sort_finished(table: &mut TableViewModel, key: SortKey, descending: bool) {
    let column = Column::from(key);
    let state = table.sort_by_column(column);
    if descending != (state.direction == SortDirection::Descending) {
        table.sort_by_column(column);
    }
}

/// Display year shown on a saved master page, if any.
fn read_display_year(path: &Path) -> Result<Option<String>> {
    let html = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    let year = display_year_from_html(&html);
    if year.is_none() {
        warn!(path = %path.display(), "no display year found in page");
    }
    Ok(year)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Visible rows as an aligned plain-text table.
fn render_text(table: &TableViewModel) -> String {
    let header = Column::ALL.map(|c| c.header().to_string());
    let rows: Vec<[String; 4]> = table.visible_rows().map(|r| r.cells()).collect();

    let mut widths = header.clone().map(|h| h.chars().count());
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String; 4]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 3);
    out.push(line(&header));
    out.push(widths.map(|w| "-".repeat(w)).join("  "));
    out.extend(rows.iter().map(|cells| line(cells)));
    out.push(format!("{} of {} versions shown", table.visible_len(), table.len()));
    out.join("\n")
}

/// Visible rows as a JSON document.
fn render_json(
    table: &TableViewModel,
    summary: &RunSummary,
    site_url: &str,
    generated_at: DateTime<Utc>,
) -> serde_json::Value {
    let rows: Vec<_> = table
        .visible_rows()
        .map(|row| {
            let record = row.record();
            serde_json::json!({
                "id": record.id.0,
                "release": row.cell(Column::Release),
                "country": record.subregion,
                "year": record.year,
                "tracks": record.detail_count,
                "status": record.status,
                "link": row.release_link(site_url),
            })
        })
        .collect();

    serde_json::json!({
        "master_id": summary.parent_id.0,
        "run_id": summary.run_id.to_string(),
        "generated_at": generated_at.to_rfc3339(),
        "total": table.len(),
        "shown": rows.len(),
        "sort": table.sort_state().map(|s| serde_json::json!({
            "column": s.column.header(),
            "descending": s.direction == SortDirection::Descending,
        })),
        "filter": table.query(),
        "rows": rows,
    })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn rows_listed(&self, count: usize) {
        self.spinner.set_message(format!("Listed {count} versions"));
    }

    fn batch_completed(&self, done: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching release details [{done}/{total}]"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
