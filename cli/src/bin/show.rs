use anyhow::Result;
use clap::Parser;
use cli::cli::{init_logging, LevelFilter};
use cli::runner;

/// Show the standard descriptor set of a connected USB device as a hex table.
#[derive(Parser, Debug)]
#[clap(about, version)]
struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();
    init_logging(args.log_level)?;

    runner::run_show()
}
