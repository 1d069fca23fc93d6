use std::io::Write;

use anyhow::Context;
use spinner_core::{Config, Parameters, RESERVED_FIELDS};
use spinner_summary_model::{store_run_artifact, ResultTable, RunArtifact, RunMetadata};

use crate::context::RunnerContext;
use crate::env::snapshot;
use crate::instance::InstanceRunner;
use crate::progress::{Progress, ProgressReporter};
use crate::shell::shell_path;
use crate::types::SpinnerResult;

/// Run every benchmark of `config` and write the resulting artifact to `sink`.
///
/// Benchmarks run one after another in declaration order. `extra` parameters are added to every
/// sweep and recorded in the run metadata.
pub fn run<W: Write>(
    runner_context: &RunnerContext,
    config: &Config,
    sink: &mut W,
    extra: Option<&Parameters>,
) -> SpinnerResult<RunArtifact> {
    if let Some(extra) = extra {
        check_extra(config, extra)?;
    }
    let shell = shell_path()?;

    let mut metadata = RunMetadata::new(
        nanoid::nanoid!(),
        sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string()),
        chrono::Utc::now().to_rfc3339(),
        env!("CARGO_PKG_VERSION").to_string(),
        config.source(),
        extra.cloned().unwrap_or_default(),
    );
    metadata.start_env = snapshot(&config.metadata.envvars);

    log::info!(
        "Starting run {} of '{}'",
        metadata.run_id,
        config.metadata.description
    );

    let mut table = ResultTable::new(config.columns(extra));
    let mut progress = ProgressReporter::new(runner_context.no_progress());
    progress.set_total(config.sweep_jobs(extra));

    for (name, sweep) in config.sweeps(extra) {
        let application = config
            .application(name)
            .with_context(|| format!("No application for benchmark '{name}'"))?;
        let instance = InstanceRunner::new(
            name,
            application,
            &config.metadata,
            &shell,
            runner_context.verbosity(),
        );

        log::info!("Running benchmark '{name}' with {} combinations", sweep.len());
        let recorded = runner_context.executor().execute_in_place(async {
            instance
                .run(sweep, &mut table, &mut progress)
                .await
                .map_err(anyhow::Error::from)
        })?;
        log::info!("Benchmark '{name}' recorded {recorded} results");
    }

    progress.finish();
    metadata.finish(
        chrono::Utc::now().to_rfc3339(),
        snapshot(&config.metadata.envvars),
    );

    let artifact = table.finalize(config.source().clone(), metadata);
    store_run_artifact(&artifact, sink).context("Failed to write run artifact")?;

    Ok(artifact)
}

/// Extra parameters end up both in result rows and beside the run metadata fields, so they must
/// not take a name either of those already uses.
fn check_extra(config: &Config, extra: &Parameters) -> SpinnerResult<()> {
    let clashing = extra
        .keys()
        .filter(|key| {
            RESERVED_FIELDS.contains(&key.as_str())
                || RunMetadata::FIELDS.contains(&key.as_str())
                || config
                    .applications()
                    .any(|(_, application)| application.captures().contains(*key))
        })
        .cloned()
        .collect::<Vec<_>>();
    if !clashing.is_empty() {
        anyhow::bail!(
            "Extra parameters use reserved or captured field names: {}",
            clashing.join(", ")
        );
    }
    Ok(())
}
