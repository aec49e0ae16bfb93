use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use textfe::cli::{self, CliArgs};
use textfe::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Session log (overwrites the previous session's log)
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    logger::init_with(level, args.verbose);
    log::info!("TextFE {} starting", env!("CARGO_PKG_VERSION"));
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        println!("log: {}", path.display());
    }

    cli::run(args)
}
