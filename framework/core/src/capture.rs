use regex::Regex;
use serde_json::{Map, Value};

use crate::transform::Transform;
use crate::validation::{type_name, Validator};

/// Field names that every result row has, so captures and plots may not redefine them.
pub const RESERVED_FIELDS: [&str; 2] = ["name", "time"];

/// A rule that extracts a named field from the combined output of a successful run.
#[derive(Debug, Clone)]
pub enum Capture {
    /// Keep the whole output verbatim.
    All { name: String },
    /// Take the first line that matches `pattern` at its start and pass it through `transform`.
    Matches {
        name: String,
        pattern: Regex,
        transform: Option<Transform>,
    },
}

impl Capture {
    pub fn name(&self) -> &str {
        match self {
            Capture::All { name } | Capture::Matches { name, .. } => name,
        }
    }

    /// Produce this rule's `(field, value)` pair from a run's output.
    ///
    /// A `matches` rule with no matching line yields `null`, as does a transform that fails to
    /// evaluate.
    pub fn process(&self, output: &str) -> (String, Value) {
        let value = match self {
            Capture::All { .. } => Value::String(output.to_string()),
            Capture::Matches {
                name,
                pattern,
                transform,
            } => {
                let line = output
                    .lines()
                    .find(|line| pattern.find(line).is_some_and(|m| m.start() == 0));
                match (line, transform) {
                    (None, _) => Value::Null,
                    (Some(line), None) => Value::String(line.to_string()),
                    (Some(line), Some(transform)) => match transform.apply(line) {
                        Ok(value) => value,
                        Err(e) => {
                            log::warn!(
                                "Capture '{name}' failed to transform line {line:?} with `{}`: {e}",
                                transform.source()
                            );
                            Value::Null
                        }
                    },
                }
            }
        };
        (self.name().to_string(), value)
    }

    pub(crate) fn from_value(value: &Value, v: &mut Validator) -> Option<Self> {
        let map = v.object(value)?;
        let name = v.required_string(map, "name");
        if let Some(name) = &name {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                v.at("name", |v| v.error(format!("'{name}' is a reserved field name")));
            }
        }

        match map.get("type") {
            Some(Value::String(kind)) if kind == "all" => {
                v.unknown_keys(map, &["type", "name"]);
                Some(Capture::All { name: name? })
            }
            Some(Value::String(kind)) if kind == "matches" => {
                v.unknown_keys(map, &["type", "name", "pattern", "lambda"]);
                let pattern = v
                    .required_string(map, "pattern")
                    .and_then(|pattern| match Regex::new(&pattern) {
                        Ok(regex) => Some(regex),
                        Err(e) => {
                            v.at("pattern", |v| v.error(format!("invalid pattern: {e}")));
                            None
                        }
                    });
                let transform = parse_transform(map, v);
                Some(Capture::Matches {
                    name: name?,
                    pattern: pattern?,
                    transform: transform?,
                })
            }
            Some(Value::String(kind)) => {
                v.at("type", |v| {
                    v.error(format!("unknown capture type '{kind}', expected 'all' or 'matches'"))
                });
                None
            }
            Some(other) => {
                v.at("type", |v| {
                    v.error(format!("expected a string, got {}", type_name(other)))
                });
                None
            }
            None => {
                v.at("type", |v| v.error("field required"));
                None
            }
        }
    }
}

/// `Some(None)` when no transform is declared, `None` when the declared one is invalid.
fn parse_transform(map: &Map<String, Value>, v: &mut Validator) -> Option<Option<Transform>> {
    match map.get("lambda") {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(source)) => match Transform::parse(source) {
            Ok(transform) => Some(Some(transform)),
            Err(e) => {
                v.at("lambda", |v| v.error(e.to_string()));
                None
            }
        },
        Some(other) => {
            v.at("lambda", |v| {
                v.error(format!("expected a string, got {}", type_name(other)))
            });
            None
        }
    }
}
