use anyhow::Result;
use blockpy_core::cli::Args;
use clap::Parser;
use tracing::Level;

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    blockpy_core::run_cli(&args)
}
