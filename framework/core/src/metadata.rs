use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::validation::{type_name, Validator};

/// Which environment variables are recorded in the run artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvCapture {
    /// Record the whole environment.
    All,
    /// Record only the named variables, skipping any that are not set.
    Only(Vec<String>),
}

impl Default for EnvCapture {
    fn default() -> Self {
        EnvCapture::Only(Vec::new())
    }
}

/// The `metadata` section of a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub description: String,
    pub version: String,
    /// Repetitions of every parameter combination.
    pub runs: u64,
    /// Limit for a single attempt, in seconds.
    pub timeout: Option<f64>,
    /// Attempt budget for one run. Zero still allows a single attempt.
    pub retry: u32,
    pub envvars: EnvCapture,
    pub success_on_return: Option<Vec<i32>>,
    pub fail_on_return: Option<Vec<i32>>,
}

const KNOWN_FIELDS: [&str; 8] = [
    "description",
    "version",
    "runs",
    "timeout",
    "retry",
    "envvars",
    "success_on_return",
    "fail_on_return",
];

fn version_regex() -> &'static Regex {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    VERSION_RE.get_or_init(|| Regex::new(r"^v?\d+\.\d+(\.\d+)?$").unwrap())
}

impl Metadata {
    /// Decide whether an exit code counts as success.
    ///
    /// `success_on_return` lists the only accepted codes, `fail_on_return` lists the only rejected
    /// codes, and with neither set only `0` is accepted.
    pub fn is_success(&self, code: i32) -> bool {
        match (&self.success_on_return, &self.fail_on_return) {
            (Some(success), _) => success.contains(&code),
            (None, Some(fail)) => !fail.contains(&code),
            (None, None) => code == 0,
        }
    }

    /// The number of attempts allowed for one run.
    pub fn attempts(&self) -> u32 {
        self.retry.max(1)
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }

    pub(crate) fn from_value(value: &Value, v: &mut Validator) -> Option<Self> {
        let map = v.object(value)?;
        v.unknown_keys(map, &KNOWN_FIELDS);
        let errors_before = v.error_count();

        let description = v.required_string(map, "description");

        let version = v.at("version", |v| match map.get("version") {
            Some(Value::String(s)) => Some(s.clone()),
            // YAML reads `version: 1.0` as a number
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                v.error(format!("expected a string, got {}", type_name(other)));
                None
            }
            None => {
                v.error("field required");
                None
            }
        });
        if let Some(version) = &version {
            if !version_regex().is_match(version) {
                v.at("version", |v| {
                    v.error(format!(
                        "'{version}' does not match pattern '{}'",
                        version_regex().as_str()
                    ))
                });
            }
        }

        let runs = v.at("runs", |v| match map.get("runs") {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(runs) if runs > 0 => Some(runs as u64),
                Some(_) => {
                    v.error("must be greater than 0");
                    None
                }
                None => {
                    v.error("expected an integer");
                    None
                }
            },
            Some(other) => {
                v.error(format!("expected an integer, got {}", type_name(other)));
                None
            }
            None => {
                v.error("field required");
                None
            }
        });

        let timeout = v.at("timeout", |v| match map.get("timeout") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(timeout) if timeout > 0.0 && timeout.is_finite() => Some(timeout),
                _ => {
                    v.error("must be greater than 0");
                    None
                }
            },
            Some(other) => {
                v.error(format!("expected a number, got {}", type_name(other)));
                None
            }
        });

        let retry = v.at("retry", |v| match map.get("retry") {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(retry)) => u32::from(*retry),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(retry) if retry >= 0 => u32::try_from(retry).unwrap_or(u32::MAX),
                Some(_) => {
                    v.error("must be greater than or equal to 0");
                    0
                }
                None => {
                    v.error("expected an integer");
                    0
                }
            },
            Some(other) => {
                v.error(format!("expected an integer or boolean, got {}", type_name(other)));
                0
            }
        });

        let envvars = v.at("envvars", |v| match map.get("envvars") {
            None | Some(Value::Null) => EnvCapture::default(),
            Some(Value::String(s)) if s == "all" || s == "*" => EnvCapture::All,
            Some(Value::Array(names)) => {
                let mut only = Vec::with_capacity(names.len());
                for (index, name) in names.iter().enumerate() {
                    match name {
                        Value::String(name) => only.push(name.clone()),
                        other => v.at(index, |v| {
                            v.error(format!("expected a string, got {}", type_name(other)))
                        }),
                    }
                }
                EnvCapture::Only(only)
            }
            Some(other) => {
                v.error(format!(
                    "expected a list of names or 'all', got {}",
                    type_name(other)
                ));
                EnvCapture::default()
            }
        });

        let success_on_return = v.optional_int_list(map, "success_on_return");
        let fail_on_return = v.optional_int_list(map, "fail_on_return");
        if success_on_return.is_some() && fail_on_return.is_some() {
            v.error("'success_on_return' and 'fail_on_return' are mutually exclusive");
        }

        // An absent timeout only counts when the field itself validated
        let timeout_is_absent = map.get("timeout").map_or(true, Value::is_null);
        if retry > 0
            && timeout_is_absent
            && success_on_return.is_none()
            && fail_on_return.is_none()
        {
            v.error("'retry' requires a 'timeout' or a return code policy ('success_on_return' or 'fail_on_return')");
        }

        if v.error_count() > errors_before {
            return None;
        }

        Some(Metadata {
            description: description?,
            version: version?,
            runs: runs?,
            timeout,
            retry,
            envvars,
            success_on_return,
            fail_on_return,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata() -> Value {
        json!({
            "description": "Lorem ipsum dolor sit amet.",
            "version": "1.0",
            "runs": 2,
            "timeout": 5,
            "retry": true,
        })
    }

    fn parse(value: Value) -> Result<Metadata, crate::ValidationError> {
        let mut v = Validator::new();
        let metadata = Metadata::from_value(&value, &mut v);
        v.finish().map(|_| metadata.unwrap())
    }

    fn with(key: &str, value: Value) -> Value {
        let mut base = metadata();
        base[key] = value;
        base
    }

    #[test]
    fn valid_metadata() {
        let metadata = parse(metadata()).unwrap();
        assert_eq!(metadata.runs, 2);
        assert_eq!(metadata.retry, 1);
        assert_eq!(metadata.timeout, Some(5.0));
        assert_eq!(metadata.envvars, EnvCapture::Only(vec![]));
    }

    #[test]
    fn invalid_versions() {
        for version in ["", "1", "1.", "1.0.0.0", "x1.0"] {
            let err = parse(with("version", json!(version))).unwrap_err();
            assert!(err.issue_at(&["version"]).is_some(), "{version} accepted");
        }
        for version in ["1.0", "v1.2", "v1.2.3"] {
            assert!(parse(with("version", json!(version))).is_ok(), "{version} rejected");
        }
    }

    #[test]
    fn numeric_version_is_accepted() {
        assert_eq!(parse(with("version", json!(1.5))).unwrap().version, "1.5");
    }

    #[test]
    fn invalid_runs() {
        for runs in [json!(0), json!(-1), json!("3")] {
            assert!(parse(with("runs", runs)).unwrap_err().issue_at(&["runs"]).is_some());
        }
    }

    #[test]
    fn invalid_timeout() {
        for timeout in [json!(0.0), json!(-1.0)] {
            assert!(parse(with("timeout", timeout))
                .unwrap_err()
                .issue_at(&["timeout"])
                .is_some());
        }
    }

    #[test]
    fn retry_without_timeout_requires_policy() {
        let err = parse(with("timeout", Value::Null)).unwrap_err();
        assert_eq!(err.issues().len(), 1);

        let mut value = with("timeout", Value::Null);
        value["fail_on_return"] = json!([1]);
        assert!(parse(value).is_ok());
    }

    #[test]
    fn missing_retry_defaults_to_zero() {
        let mut value = metadata();
        value.as_object_mut().unwrap().remove("retry");
        assert_eq!(parse(value).unwrap().retry, 0);
    }

    #[test]
    fn return_code_policies_are_exclusive() {
        let mut value = with("success_on_return", json!([0]));
        value["fail_on_return"] = json!([-1]);
        let err = parse(value).unwrap_err();
        assert!(err.issues()[0].message.contains("mutually exclusive"));
    }

    #[test]
    fn is_success_with_lists() {
        let md = parse(with("success_on_return", json!([0, -1]))).unwrap();
        assert!(md.is_success(0));
        assert!(md.is_success(-1));
        assert!(!md.is_success(1));

        let md = parse(with("fail_on_return", json!([-1, -6]))).unwrap();
        assert!(md.is_success(0));
        assert!(md.is_success(3));
        assert!(!md.is_success(-1));
        assert!(!md.is_success(-6));

        let md = parse(metadata()).unwrap();
        assert!(md.is_success(0));
        assert!(!md.is_success(1));
    }

    #[test]
    fn envvars_capture_all() {
        let md = parse(with("envvars", json!("all"))).unwrap();
        assert_eq!(md.envvars, EnvCapture::All);
        let md = parse(with("envvars", json!(["HOME", "PATH"]))).unwrap();
        assert_eq!(
            md.envvars,
            EnvCapture::Only(vec!["HOME".to_string(), "PATH".to_string()])
        );
    }

    #[test]
    fn reports_all_errors_at_once() {
        let err = parse(json!({"version": "x", "runs": 0, "timeout": -2})).unwrap_err();
        assert!(err.issue_at(&["description"]).is_some());
        assert!(err.issue_at(&["version"]).is_some());
        assert!(err.issue_at(&["runs"]).is_some());
        assert!(err.issue_at(&["timeout"]).is_some());
    }
}
