//! Museum Workers - Entry Point

use clap::Parser;
use core_config::tracing::install_color_eyre;
use museum_workers::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();
    museum_workers::run(Cli::parse()).await
}
