use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use spinner_core::Parameters;

use crate::extra_args::parse_extra_args;

#[derive(Parser)]
#[command(name = "spinner", version, about, long_about = None)]
pub struct SpinnerCli {
    /// Log more detail. Once to show each command as it runs, twice to also show its output.
    ///
    /// `RUST_LOG` takes precedence over this flag for choosing which log levels are shown.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: SpinnerCommand,
}

#[derive(Subcommand)]
pub enum SpinnerCommand {
    /// Run every benchmark in a configuration and write the results
    Run(RunArgs),
    /// Validate a configuration without running anything
    Check {
        /// Path to the configuration file
        config: PathBuf,
    },
    /// Print the results stored in a run artifact
    Show {
        /// Path to the artifact written by `spinner run`
        artifact: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the configuration file
    pub config: PathBuf,

    /// Where to write the run artifact
    #[arg(short, long, default_value = "bench_metadata.msgpack")]
    pub output: PathBuf,

    /// Host names, passed to commands as the `hosts` parameter. For example `--hosts=nodeA,nodeB`.
    #[arg(long)]
    pub hosts: Option<String>,

    /// Extra parameters for every benchmark, in the format `key=value;key=value`.
    ///
    /// Values are read as literals where possible, so `size=[1,2]` sweeps over both sizes while
    /// `size=4` holds it constant. An extra parameter replaces a benchmark parameter of the same
    /// name.
    #[arg(long, value_parser = parse_extra_args)]
    pub extra_args: Option<Parameters>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,
}

impl RunArgs {
    /// Merge `--hosts` into the extra parameters.
    pub fn extra_parameters(&self) -> Option<Parameters> {
        let mut extra = self.extra_args.clone().unwrap_or_default();
        if let Some(hosts) = &self.hosts {
            extra.insert("hosts".to_string(), serde_json::Value::String(hosts.clone()));
        }
        (!extra.is_empty()).then_some(extra)
    }
}
