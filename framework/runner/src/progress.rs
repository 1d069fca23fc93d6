use indicatif::{ProgressBar, ProgressStyle};

/// Observes how far a run has got.
///
/// The total counts the result rows a complete run would produce. Failed attempts and retries do
/// not move it.
pub trait Progress {
    fn set_total(&mut self, total: u64);

    fn step(&mut self);
}

/// Draws a progress bar on the terminal while benchmarks run.
#[derive(Debug)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(no_progress: bool) -> Self {
        let bar = if no_progress {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            match ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} [{elapsed_precise}]",
            ) {
                Ok(style) => bar.set_style(style.progress_chars("#>-")),
                Err(e) => log::debug!("Using the default progress style: {e}"),
            }
            bar
        };
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        log::trace!("Progress finished at {}", self.bar.position());
        self.bar.finish_and_clear();
    }
}

impl Progress for ProgressReporter {
    fn set_total(&mut self, total: u64) {
        self.bar.set_length(total);
    }

    fn step(&mut self) {
        self.bar.inc(1);
    }
}
