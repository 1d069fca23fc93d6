use clap::Parser;
use log::LevelFilter;

use crate::cli::SpinnerCli;

/// Initialise the CLI and logging for spinner.
///
/// `RUST_LOG` wins when it is set, otherwise `-v` raises the level from warnings to info.
pub fn init() -> SpinnerCli {
    let cli = SpinnerCli::parse();

    let level = if cli.verbose == 0 {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    cli
}
