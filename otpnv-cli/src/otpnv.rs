//! OTP / NV Counter Image Tool - Main Entry Point

use anyhow::Result;
use clap::Parser;

mod cli;
mod image;

fn main() -> Result<()> {
    env_logger::init();
    let cli = cli::Cli::parse();
    cli::run(cli)
}
