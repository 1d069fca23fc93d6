//! Configuration schema and parameter sweep engine for Spinner.
//!
//! A configuration is loaded with [`Config::load`], which validates the whole document and
//! reports every problem at once. The loaded configuration is then read-only and can be swept
//! any number of times.

mod application;
mod benchmark;
mod capture;
mod config;
mod metadata;
mod sweep;
mod template;
mod transform;
mod validation;

/// Parameter values for one combination, in sweep order.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

pub use application::{Application, Plot};
pub use benchmark::{Benchmark, ZIP_KEY};
pub use capture::{Capture, RESERVED_FIELDS};
pub use config::{Config, ConfigError};
pub use metadata::{EnvCapture, Metadata};
pub use sweep::Sweep;
pub use template::{render_value, Command, TemplateError};
pub use transform::{Transform, TransformError};
pub use validation::{PathSegment, ValidationError, ValidationIssue};

pub mod prelude {
    pub use crate::{
        Application, Benchmark, Capture, Command, Config, ConfigError, EnvCapture, Metadata,
        Parameters, TemplateError, ValidationError,
    };
}
