use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use spinner_core::Config;
use spinner_runner::prelude::{run, RunnerContext, SpinnerResult};
use spinner_summary_model::load_run_artifact_file;

use crate::cli::{RunArgs, SpinnerCommand};

mod cli;
mod extra_args;
mod init;
mod show;

fn main() -> SpinnerResult<()> {
    let cli = init::init();

    match cli.command {
        SpinnerCommand::Run(args) => run_benchmarks(args, cli.verbose),
        SpinnerCommand::Check { config } => check(&config),
        SpinnerCommand::Show { artifact } => {
            let artifact = load_run_artifact_file(&artifact)
                .with_context(|| format!("Failed to read artifact '{}'", artifact.display()))?;
            show::print_artifact(&artifact);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> SpinnerResult<Config> {
    Config::load_file(path).with_context(|| format!("Failed to load '{}'", path.display()))
}

fn run_benchmarks(args: RunArgs, verbosity: u8) -> SpinnerResult<()> {
    let config = load_config(&args.config)?;
    let extra = args.extra_parameters();

    let runner_context = RunnerContext::new()?
        .with_verbosity(verbosity)
        .with_no_progress(args.no_progress);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create '{}'", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    let artifact = run(&runner_context, &config, &mut writer, extra.as_ref())?;
    writer.flush()?;

    println!(
        "Recorded {} of {} results to {}",
        artifact.dataframe.len(),
        config.sweep_jobs(extra.as_ref()),
        args.output.display()
    );
    Ok(())
}

fn check(path: &Path) -> SpinnerResult<()> {
    let config = load_config(path)?;

    for warning in config.warnings() {
        println!("warning: {warning}");
    }
    for (name, benchmark) in config.benchmarks() {
        println!(
            "{name}: {} combinations x {} runs",
            benchmark.num_jobs(),
            config.metadata.runs
        );
    }
    println!("{} is valid, {} jobs in total", path.display(), config.num_jobs());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_configs_are_valid() {
        let demos = [
            ("sleep", include_str!("../../../demos/sleep.yaml"), 6, 0),
            ("capture", include_str!("../../../demos/capture.yaml"), 9, 0),
            ("zip", include_str!("../../../demos/zip.yaml"), 6, 0),
            ("extra_args", include_str!("../../../demos/extra_args.yaml"), 2, 2),
        ];
        for (name, raw, jobs, warnings) in demos {
            let config = Config::load(raw).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(config.num_jobs(), jobs, "{name}");
            assert_eq!(config.warnings().len(), warnings, "{name}");
        }
    }
}
