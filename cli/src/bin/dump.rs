use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cli::cli::{init_logging, LevelFilter};
use cli::output::DUMP_FILE;
use cli::runner;

/// Dump the standard descriptor set of a connected USB device to a file.
#[derive(Parser, Debug)]
#[clap(about, version)]
struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    log_level: LevelFilter,

    /// File the descriptor bytes are written to
    #[clap(long, default_value = DUMP_FILE)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();
    init_logging(args.log_level)?;

    runner::run_dump(&args.output)
}
