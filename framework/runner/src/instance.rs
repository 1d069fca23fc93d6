use std::path::Path;

use serde_json::Value;
use spinner_core::{Application, Metadata, Parameters, TemplateError};
use spinner_summary_model::{ResultTable, SchemaDriftError};

use crate::process::{run_command, Outcome};
use crate::progress::Progress;

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// The command could not be rendered. Rendering is deterministic, so there is no point in
    /// trying the remaining combinations of the application.
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    SchemaDrift(#[from] SchemaDriftError),
    #[error("Failed to launch command: {0}")]
    Launch(#[from] std::io::Error),
}

/// Runs the parameter combinations of one benchmark against its application.
#[derive(Debug)]
pub struct InstanceRunner<'a> {
    name: &'a str,
    application: &'a Application,
    metadata: &'a Metadata,
    shell: &'a Path,
    verbosity: u8,
}

impl<'a> InstanceRunner<'a> {
    pub fn new(
        name: &'a str,
        application: &'a Application,
        metadata: &'a Metadata,
        shell: &'a Path,
        verbosity: u8,
    ) -> Self {
        Self {
            name,
            application,
            metadata,
            shell,
            verbosity,
        }
    }

    /// Run every combination in order, `metadata.runs` times each.
    ///
    /// A command that cannot be rendered stops this benchmark and is logged, any other error is
    /// returned.
    pub async fn run(
        &self,
        combinations: impl IntoIterator<Item = Parameters>,
        table: &mut ResultTable,
        progress: &mut dyn Progress,
    ) -> Result<usize, InstanceError> {
        let mut recorded = 0;
        for parameters in combinations {
            match self.run_with_parameters(&parameters, table, progress).await {
                Ok(rows) => recorded += rows,
                Err(InstanceError::Template(e)) => {
                    log::error!(
                        "Skipping the remaining runs of '{}', failed to render `{}`: {e}",
                        self.name,
                        self.application.command()
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(recorded)
    }

    /// Run one parameter combination `metadata.runs` times, appending a row for every run that
    /// succeeds. Returns the number of rows appended.
    pub async fn run_with_parameters(
        &self,
        parameters: &Parameters,
        table: &mut ResultTable,
        progress: &mut dyn Progress,
    ) -> Result<usize, InstanceError> {
        let command = self.application.render(parameters)?;

        let mut recorded = 0;
        for run in 0..self.metadata.runs {
            if self.verbosity >= 1 {
                log::info!("{} run {run}: $ {command}", self.name);
            }

            let Some(outcome) = self.attempt(&command).await? else {
                continue;
            };

            let mut row = Parameters::new();
            row.insert("name".to_string(), Value::String(self.name.to_string()));
            row.extend(parameters.clone());
            row.extend(self.application.process_output(&outcome.output()));
            row.insert("time".to_string(), Value::from(outcome.elapsed.as_secs_f64()));
            table.append(&row)?;

            progress.step();
            recorded += 1;
        }
        Ok(recorded)
    }

    /// Run the command until it succeeds or the attempts run out.
    async fn attempt(&self, command: &str) -> Result<Option<Outcome>, InstanceError> {
        let attempts = self.metadata.attempts();
        for attempt in 1..=attempts {
            let outcome = run_command(self.shell, command, self.metadata.timeout_duration()).await?;
            if self.verbosity >= 2 {
                log::info!("return code: {}", outcome.code);
                log::info!("stdout: {}", outcome.stdout);
                log::info!("stderr: {}", outcome.stderr);
                log::info!("elapsed: {:.3}s", outcome.elapsed.as_secs_f64());
            }

            if !outcome.timed_out && self.metadata.is_success(outcome.code) {
                return Ok(Some(outcome));
            }

            if attempt < attempts {
                log::info!(
                    "Retrying `{command}` ({attempt}/{attempts} failed with return code {})",
                    outcome.code
                );
            } else {
                log::error!(
                    "Failed to run command. `{command}` returned {} after {attempts} attempt(s): {}",
                    outcome.code,
                    outcome.stderr.trim()
                );
            }
        }
        Ok(None)
    }
}
