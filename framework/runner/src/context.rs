use std::sync::Arc;

use anyhow::Context;

use crate::executor::Executor;
use crate::types::SpinnerResult;

/// State shared by everything that takes part in a run.
///
/// Passed explicitly to [crate::run::run] rather than looked up globally.
#[derive(Debug)]
pub struct RunnerContext {
    executor: Arc<Executor>,
    verbosity: u8,
    no_progress: bool,
}

impl RunnerContext {
    pub fn new() -> SpinnerResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;
        Ok(Self {
            executor: Arc::new(Executor::new(runtime)),
            verbosity: 0,
            no_progress: false,
        })
    }

    /// Set how much detail is logged about each command.
    ///
    /// At 1 every rendered command is logged before it runs. At 2 the return code, output and
    /// elapsed time of every attempt are logged too.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Do not draw a progress bar.
    pub fn with_no_progress(mut self, no_progress: bool) -> Self {
        self.no_progress = no_progress;
        self
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn no_progress(&self) -> bool {
        self.no_progress
    }
}
