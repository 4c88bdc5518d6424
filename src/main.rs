use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use screenm::cli::{run_cli, Cli};

fn main() -> Result<()> {
    // Default to info-level progress; RUST_LOG overrides.
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run_cli(cli)
}
