use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cli::cli::{init_logging, LevelFilter};
use cli::output::DUMP_FILE;
use cli::runner;

/// Decode a persisted descriptor dump into named fields.
#[derive(Parser, Debug)]
#[clap(about, version)]
struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    log_level: LevelFilter,

    /// Hex dump to decode; pass '-' to read from stdin
    #[clap(default_value = DUMP_FILE)]
    input: PathBuf,
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();
    init_logging(args.log_level)?;

    runner::run_decode(&args.input)
}
