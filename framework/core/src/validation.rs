use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};

/// One step in the location of a problem inside a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(value: String) -> Self {
        PathSegment::Key(value)
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

/// A single problem found while validating a configuration, with the path of keys and indices
/// that leads to it, e.g. `applications.echo.capture.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub location: Vec<PathSegment>,
    pub message: String,
}

impl ValidationIssue {
    /// The location rendered as a dotted path.
    pub fn path(&self) -> String {
        self.location
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Check whether this issue is located at the given path.
    pub fn is_at(&self, path: &[&str]) -> bool {
        self.location.len() == path.len()
            && self
                .location
                .iter()
                .zip(path)
                .all(|(segment, expected)| segment.to_string() == *expected)
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path(), self.message)
        }
    }
}

/// Every problem found in a configuration document.
///
/// Validation does not stop at the first problem, so this carries all of them and the caller can
/// report them together.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Find the first issue reported at the given path.
    pub fn issue_at(&self, path: &[&str]) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.is_at(path))
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let count = self.issues.len();
        write!(
            f,
            "{count} validation error{} in configuration",
            if count == 1 { "" } else { "s" }
        )?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

/// Walks a configuration document while tracking the current location, collecting errors and
/// warnings instead of returning on the first one.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    path: Vec<PathSegment>,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `f` with `segment` appended to the current location.
    pub(crate) fn at<R>(
        &mut self,
        segment: impl Into<PathSegment>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.path.push(segment.into());
        let result = f(self);
        self.path.pop();
        result
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            location: self.path.clone(),
            message: message.into(),
        });
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let issue = ValidationIssue {
            location: self.path.clone(),
            message: message.into(),
        };
        log::warn!("{issue}");
        self.warnings.push(issue);
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Expect the value at the current location to be a mapping.
    pub(crate) fn object<'v>(&mut self, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.error(format!("expected a mapping, got {}", type_name(other)));
                None
            }
        }
    }

    /// Expect `key` to hold a string.
    pub(crate) fn required_string(&mut self, map: &Map<String, Value>, key: &str) -> Option<String> {
        match map.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.at(key, |v| {
                    v.error(format!("expected a string, got {}", type_name(other)))
                });
                None
            }
            None => {
                self.at(key, |v| v.error("field required"));
                None
            }
        }
    }

    /// Expect `key` to be absent, null or a list of integers.
    pub(crate) fn optional_int_list(
        &mut self,
        map: &Map<String, Value>,
        key: &str,
    ) -> Option<Vec<i32>> {
        let value = map.get(key).filter(|v| !v.is_null())?;
        self.at(key, |v| {
            let Value::Array(items) = value else {
                v.error(format!("expected a list of integers, got {}", type_name(value)));
                return None;
            };
            let mut codes = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match item.as_i64().and_then(|n| i32::try_from(n).ok()) {
                    Some(code) => codes.push(code),
                    None => v.at(index, |v| {
                        v.error(format!("expected an integer, got {}", type_name(item)))
                    }),
                }
            }
            Some(codes)
        })
    }

    /// Warn about keys that are not part of the schema.
    pub(crate) fn unknown_keys(&mut self, map: &Map<String, Value>, known: &[&str]) {
        for key in map.keys().filter(|key| !known.contains(&key.as_str())) {
            self.at(key.as_str(), |v| v.warn("unknown field is ignored"));
        }
    }

    pub(crate) fn finish(self) -> Result<Vec<ValidationIssue>, ValidationError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationError::new(self.errors))
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
