//! MasterTable TUI: browse, sort and filter the versions of a master release.
//!
//! Usage: `mastertable-tui [MASTER_ID | MASTER_URL]`. Press `g` to open
//! another master, `?` for keybindings.

mod app;
mod screens;
mod widgets;

use color_eyre::eyre::Result;

use mastertable_catalog::CatalogClient;
use mastertable_core::PipelineController;
use mastertable_shared::{PipelineConfig, load_config};

/// Environment variable enabling logs (to stderr) when set, e.g. `MASTERTABLE_LOG=debug`.
const LOG_ENV: &str = "MASTERTABLE_LOG";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = load_config()?;
    let pipeline = PipelineConfig::from(&config);
    pipeline.validate()?;
    let client = CatalogClient::new(&config.api)?;
    let initial = std::env::args().nth(1);

    // One thread: pipeline tasks progress while the draw loop yields.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let controller = PipelineController::new(client, pipeline.clone());
        app::run(controller, pipeline.site_url, initial).await
    })
}

/// Logs would tear the alternate screen, so they are opt-in.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) else {
        return;
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
