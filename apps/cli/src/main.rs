//! profsite CLI: mirror Zotero bibliographies and render cited markdown.
//!
//! Manages the libraries, citation styles, site settings, posts, and
//! institutions of a personal academic website.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
