//! MasterTable CLI: every version of a Discogs master release, as one table.
//!
//! Lists all versions, then fills in year and track count per release
//! in paced batches.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
