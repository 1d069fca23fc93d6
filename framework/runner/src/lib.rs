mod context;
mod env;
mod executor;
mod instance;
mod process;
mod progress;
mod run;
mod shell;
mod types;

pub mod prelude {
    pub use crate::context::RunnerContext;
    pub use crate::env::snapshot;
    pub use crate::executor::Executor;
    pub use crate::instance::{InstanceError, InstanceRunner};
    pub use crate::process::{run_command, Outcome, TIMEOUT_CODE};
    pub use crate::progress::{Progress, ProgressReporter};
    pub use crate::run::run;
    pub use crate::shell::{shell_path, SPINNER_SHELL_ENV};
    pub use crate::types::SpinnerResult;
}
