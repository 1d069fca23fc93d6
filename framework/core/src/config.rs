use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

use crate::application::Application;
use crate::benchmark::Benchmark;
use crate::capture::RESERVED_FIELDS;
use crate::metadata::Metadata;
use crate::sweep::Sweep;
use crate::validation::{ValidationIssue, Validator};
use crate::{Parameters, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A validated configuration: what to run, how often, and with which parameters.
///
/// Applications and benchmarks keep their declaration order, which is also the order they run in.
#[derive(Debug, Clone)]
pub struct Config {
    pub metadata: Metadata,
    applications: Vec<(String, Application)>,
    benchmarks: Vec<(String, Benchmark)>,
    source: Value,
    warnings: Vec<ValidationIssue>,
}

impl Config {
    /// Parse and validate a YAML (or JSON) document.
    pub fn load(raw: &str) -> Result<Self, ConfigError> {
        let source: Value = serde_yaml::from_str(raw)?;
        Ok(Self::from_value(source)?)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::load(&raw)
    }

    /// Validate an already parsed document, reporting every problem found.
    pub fn from_value(source: Value) -> Result<Self, ValidationError> {
        let mut v = Validator::new();
        let config = Self::validate(&source, &mut v);
        let warnings = v.finish()?;

        match config {
            Some((metadata, applications, benchmarks)) => Ok(Self {
                metadata,
                applications,
                benchmarks,
                source,
                warnings,
            }),
            // Every path that yields no config records an error
            None => Err(ValidationError::new(Vec::new())),
        }
    }

    #[allow(clippy::type_complexity)]
    fn validate(
        source: &Value,
        v: &mut Validator,
    ) -> Option<(Metadata, Vec<(String, Application)>, Vec<(String, Benchmark)>)> {
        let root = v.object(source)?;
        v.unknown_keys(root, &["metadata", "applications", "benchmarks"]);

        let metadata = v.at("metadata", |v| match root.get("metadata") {
            Some(value) => Metadata::from_value(value, v),
            None => {
                v.error("field required");
                None
            }
        });

        let applications = v.at("applications", |v| {
            let map = match root.get("applications") {
                Some(value) => v.object(value)?,
                None => {
                    v.error("field required");
                    return None;
                }
            };
            map.iter()
                .map(|(name, value)| {
                    v.at(name.as_str(), |v| Application::from_value(value, v))
                        .map(|application| (name.clone(), application))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .collect::<Option<Vec<_>>>()
        });

        let benchmarks = v.at("benchmarks", |v| {
            let map = match root.get("benchmarks") {
                Some(value) => v.object(value)?,
                None => {
                    v.error("field required");
                    return None;
                }
            };
            map.iter()
                .map(|(name, value)| {
                    v.at(name.as_str(), |v| Benchmark::from_value(value, v))
                        .map(|benchmark| (name.clone(), benchmark))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .collect::<Option<Vec<_>>>()
        });

        // Cross references are checked even if some entries failed, so the names are taken from
        // the document itself
        let application_names = root
            .get("applications")
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect::<BTreeSet<_>>())
            .unwrap_or_default();
        if let Some(map) = root.get("benchmarks").and_then(Value::as_object) {
            v.at("benchmarks", |v| {
                for name in map.keys().filter(|name| !application_names.contains(*name)) {
                    v.at(name.as_str(), |v| {
                        v.error(format!("benchmark '{name}' is undefined"))
                    });
                }
            });
        }

        let (applications, benchmarks) = (applications?, benchmarks?);
        check_placeholders(&applications, &benchmarks, v);
        check_captures(&applications, &benchmarks, v);

        Some((metadata?, applications, benchmarks))
    }

    /// The document this configuration was loaded from.
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Non-fatal problems found while loading.
    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn applications(&self) -> impl Iterator<Item = (&str, &Application)> {
        self.applications
            .iter()
            .map(|(name, application)| (name.as_str(), application))
    }

    pub fn benchmarks(&self) -> impl Iterator<Item = (&str, &Benchmark)> {
        self.benchmarks
            .iter()
            .map(|(name, benchmark)| (name.as_str(), benchmark))
    }

    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, application)| application)
    }

    pub fn benchmark(&self, name: &str) -> Option<&Benchmark> {
        self.benchmarks
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, benchmark)| benchmark)
    }

    /// Total number of successful runs a full sweep produces without extra parameters.
    pub fn num_jobs(&self) -> u64 {
        let per_run = self
            .benchmarks
            .iter()
            .map(|(_, benchmark)| benchmark.num_jobs() as u64)
            .sum::<u64>();
        self.metadata.runs * per_run
    }

    /// Like [`Config::num_jobs`] but accounting for list valued extra parameters.
    pub fn sweep_jobs(&self, extra: Option<&Parameters>) -> u64 {
        let per_run = self
            .benchmarks
            .iter()
            .map(|(_, benchmark)| benchmark.sweep(extra).len() as u64)
            .sum::<u64>();
        self.metadata.runs * per_run
    }

    /// Sweep every benchmark in declaration order.
    pub fn sweeps<'a>(
        &'a self,
        extra: Option<&'a Parameters>,
    ) -> impl Iterator<Item = (&'a str, Sweep<'a>)> {
        self.benchmarks
            .iter()
            .map(move |(name, benchmark)| (name.as_str(), benchmark.sweep(extra)))
    }

    /// The union of every application's variables.
    pub fn variables(&self) -> BTreeSet<String> {
        self.applications
            .iter()
            .flat_map(|(_, application)| application.variables())
            .collect()
    }

    /// The result table columns: `name`, every field a row can carry in sorted order, then `time`.
    pub fn columns(&self, extra: Option<&Parameters>) -> Vec<String> {
        let mut fields = self.variables();
        for (_, benchmark) in &self.benchmarks {
            fields.extend(benchmark.parameters());
        }
        if let Some(extra) = extra {
            fields.extend(extra.keys().cloned());
        }
        for reserved in RESERVED_FIELDS {
            fields.remove(reserved);
        }

        let [name, time] = RESERVED_FIELDS;
        std::iter::once(name.to_string())
            .chain(fields)
            .chain(std::iter::once(time.to_string()))
            .collect()
    }
}

/// Warn about placeholders that a benchmark never sets. They can still be supplied as extra
/// parameters when the run starts.
fn check_placeholders(
    applications: &[(String, Application)],
    benchmarks: &[(String, Benchmark)],
    v: &mut Validator,
) {
    v.at("benchmarks", |v| {
        for (name, benchmark) in benchmarks {
            let Some((_, application)) = applications.iter().find(|(key, _)| key == name) else {
                continue;
            };
            let parameters = benchmark.parameters();
            for placeholder in application.placeholders().difference(&parameters) {
                v.at(name.as_str(), |v| {
                    v.warn(format!(
                        "placeholder '{placeholder}' of application '{name}' is not a benchmark parameter"
                    ))
                });
            }
        }
    });
}

/// A benchmark parameter must not share its name with a field captured by its application.
fn check_captures(
    applications: &[(String, Application)],
    benchmarks: &[(String, Benchmark)],
    v: &mut Validator,
) {
    v.at("benchmarks", |v| {
        for (name, benchmark) in benchmarks {
            let Some((_, application)) = applications.iter().find(|(key, _)| key == name) else {
                continue;
            };
            let captures = application.captures();
            for parameter in benchmark.keys().filter(|key| captures.contains(*key)) {
                v.at(name.as_str(), |v| {
                    v.at(parameter, |v| {
                        v.error(format!(
                            "parameter '{parameter}' is also captured by application '{name}'"
                        ))
                    })
                });
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SLEEP: &str = r#"
metadata:
  description: Sleep for a while
  version: "1.0"
  runs: 2
  timeout: 10
  retry: 1
applications:
  sleep:
    command: sleep {{ amount }}
    capture:
      - type: all
        name: out
    plot:
      - title: Sleep time
        x_axis: amount
        y_axis: time
  echo:
    command: echo {{ word }} {{ count }}
benchmarks:
  sleep:
    amount: [1, 2, 3]
  echo:
    word: [a, b]
    count: [1, 2]
"#;

    #[test]
    fn loads_valid_document() {
        let config = Config::load(SLEEP).unwrap();
        assert_eq!(config.metadata.runs, 2);
        assert_eq!(
            config.applications().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["sleep", "echo"]
        );
        assert_eq!(config.num_jobs(), 2 * (3 + 4));
        assert!(config.warnings().is_empty());
        assert!(config.benchmark("echo").is_some());
        assert!(config.application("missing").is_none());
    }

    #[test]
    fn columns_are_sorted_between_name_and_time() {
        let config = Config::load(SLEEP).unwrap();
        assert_eq!(
            config.columns(None),
            vec!["name", "amount", "count", "out", "word", "time"]
        );

        let extra = serde_json::json!({"hosts": "A,B", "amount": 5});
        assert_eq!(
            config.columns(extra.as_object()),
            vec!["name", "amount", "count", "hosts", "out", "word", "time"]
        );
    }

    #[test]
    fn sweep_jobs_counts_list_extras() {
        let config = Config::load(SLEEP).unwrap();
        let extra = serde_json::json!({"repeat": [1, 2]});
        assert_eq!(config.sweep_jobs(None), config.num_jobs());
        assert_eq!(config.sweep_jobs(extra.as_object()), 2 * config.num_jobs());
    }

    #[test]
    fn benchmark_without_application() {
        let doc = SLEEP.replace("  echo:\n    word", "  echoes:\n    word");
        let err = Config::load(&doc).unwrap_err();
        let ConfigError::Invalid(err) = err else {
            panic!("expected a validation error, got {err}");
        };
        assert_eq!(
            err.issue_at(&["benchmarks", "echoes"]).unwrap().message,
            "benchmark 'echoes' is undefined"
        );
    }

    #[test]
    fn missing_placeholder_is_a_warning() {
        let doc = SLEEP.replace("    count: [1, 2]\n", "");
        let config = Config::load(&doc).unwrap();
        assert_eq!(config.warnings().len(), 1);
        assert!(config.warnings()[0].is_at(&["benchmarks", "echo"]));
        assert!(config.warnings()[0].message.contains("'count'"));
    }

    #[test]
    fn collects_errors_across_sections() {
        let doc = r#"
metadata:
  description: broken
  version: "one"
  runs: 0
  success_on_return: [0]
  fail_on_return: [1]
applications:
  app:
    command: run {{ size }}
    plot:
      - x_axis: nope
        y_axis: time
benchmarks:
  app:
    size: [1, 2]
    other: [1]
    zip: [size, other]
  ghost:
    size: [1]
"#;
        let ConfigError::Invalid(err) = Config::load(doc).unwrap_err() else {
            panic!("expected a validation error");
        };
        let paths = err.issues().iter().map(|i| i.path()).collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                "metadata.version",
                "metadata.runs",
                "metadata",
                "applications.app.plot.0.x_axis",
                "benchmarks.app.zip.1",
                "benchmarks.ghost",
            ]
        );
    }

    #[test]
    fn missing_sections() {
        let ConfigError::Invalid(err) = Config::load("metadata: {}").unwrap_err() else {
            panic!("expected a validation error");
        };
        assert!(err.issue_at(&["applications"]).is_some());
        assert!(err.issue_at(&["benchmarks"]).is_some());
        assert!(err.issue_at(&["metadata", "runs"]).is_some());
    }

    #[test]
    fn json_documents_load() {
        let doc = r#"{
            "metadata": {"description": "d", "version": "v1.0", "runs": 1},
            "applications": {"echo": {"command": "echo hello"}},
            "benchmarks": {"echo": {}}
        }"#;
        let config = Config::load(doc).unwrap();
        assert_eq!(config.num_jobs(), 1);
        assert_eq!(config.columns(None), vec!["name", "time"]);
    }

    #[test]
    fn unparsable_document() {
        assert!(matches!(
            Config::load("metadata: [unclosed").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn parameter_cannot_shadow_a_capture() {
        let doc = SLEEP.replace("    amount: [1, 2, 3]\n", "    amount: [1, 2, 3]\n    out: [a]\n");
        let ConfigError::Invalid(err) = Config::load(&doc).unwrap_err() else {
            panic!("expected a validation error");
        };
        assert_eq!(
            err.issue_at(&["benchmarks", "sleep", "out"]).unwrap().message,
            "parameter 'out' is also captured by application 'sleep'"
        );
    }

    #[test]
    fn reserved_parameter_names_are_rejected() {
        let doc = SLEEP.replace("    count: [1, 2]\n", "    count: [1, 2]\n    name: [alpha]\n");
        let ConfigError::Invalid(err) = Config::load(&doc).unwrap_err() else {
            panic!("expected a validation error");
        };
        assert_eq!(
            err.issue_at(&["benchmarks", "echo", "name"]).unwrap().message,
            "'name' is a reserved field name"
        );
    }
}
