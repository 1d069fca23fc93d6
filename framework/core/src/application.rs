use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::capture::{Capture, RESERVED_FIELDS};
use crate::template::Command;
use crate::validation::{type_name, Validator};
use crate::Parameters;

/// A chart to draw from the result table. Only the field references are checked here, drawing
/// is left to the reporting step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plot {
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    pub group_by: Vec<String>,
}

impl Plot {
    fn from_value(value: &Value, v: &mut Validator) -> Option<Self> {
        let map = v.object(value)?;
        v.unknown_keys(map, &["title", "x_axis", "y_axis", "group_by"]);

        let title = match map.get("title") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(title)) => title.clone(),
            Some(other) => {
                v.at("title", |v| {
                    v.error(format!("expected a string, got {}", type_name(other)))
                });
                String::new()
            }
        };
        let x_axis = v.required_string(map, "x_axis");
        let y_axis = v.required_string(map, "y_axis");
        let group_by = v.at("group_by", |v| match map.get("group_by") {
            None | Some(Value::Null) => Some(Vec::new()),
            Some(Value::String(field)) => Some(vec![field.clone()]),
            Some(Value::Array(fields)) => fields
                .iter()
                .enumerate()
                .map(|(index, field)| match field {
                    Value::String(field) => Some(field.clone()),
                    other => {
                        v.at(index, |v| {
                            v.error(format!("expected a string, got {}", type_name(other)))
                        });
                        None
                    }
                })
                .collect::<Vec<_>>()
                .into_iter()
                .collect::<Option<Vec<_>>>(),
            Some(other) => {
                v.error(format!(
                    "expected a field name or a list of field names, got {}",
                    type_name(other)
                ));
                None
            }
        });

        Some(Self {
            title,
            x_axis: x_axis?,
            y_axis: y_axis?,
            group_by: group_by?,
        })
    }
}

/// A command template together with what to capture from its output and how to plot it.
#[derive(Debug, Clone)]
pub struct Application {
    command: Command,
    capture: Vec<Capture>,
    plot: Vec<Plot>,
}

impl Application {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            capture: Vec::new(),
            plot: Vec::new(),
        }
    }

    pub fn with_capture(mut self, capture: Capture) -> Self {
        self.capture.push(capture);
        self
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn capture(&self) -> &[Capture] {
        &self.capture
    }

    pub fn plot(&self) -> &[Plot] {
        &self.plot
    }

    /// Placeholders referenced by the command.
    pub fn placeholders(&self) -> &BTreeSet<String> {
        self.command.placeholders()
    }

    /// Names of the captured fields.
    pub fn captures(&self) -> BTreeSet<String> {
        self.capture.iter().map(|c| c.name().to_string()).collect()
    }

    /// Every field this application contributes to a result row.
    pub fn variables(&self) -> BTreeSet<String> {
        self.placeholders()
            .iter()
            .cloned()
            .chain(self.captures())
            .collect()
    }

    pub fn render(&self, parameters: &Parameters) -> Result<String, crate::TemplateError> {
        self.command.render(parameters)
    }

    /// Apply every capture rule, in declaration order, to the output of a run.
    pub fn process_output(&self, output: &str) -> Vec<(String, Value)> {
        self.capture.iter().map(|c| c.process(output)).collect()
    }

    pub(crate) fn from_value(value: &Value, v: &mut Validator) -> Option<Self> {
        let map = v.object(value)?;
        v.unknown_keys(map, &["command", "capture", "plot"]);
        let errors_before = v.error_count();

        let template = v.required_string(map, "command");
        let command = template
            .as_deref()
            .and_then(|template| match Command::parse(template) {
                Ok(command) => Some(command),
                Err(e) => {
                    v.at("command", |v| v.error(e.to_string()));
                    None
                }
            });
        // Field names come from the document so that references are checked even when a
        // sibling entry is invalid
        let placeholders = match (&command, &template) {
            (Some(command), _) => command.placeholders().clone(),
            (None, Some(template)) => Command::placeholder_names(template),
            (None, None) => BTreeSet::new(),
        };
        for reserved in RESERVED_FIELDS.iter().filter(|f| placeholders.contains(**f)) {
            v.at("command", |v| {
                v.error(format!("'{reserved}' is a reserved field name"))
            });
        }

        let capture = list_of(map, "capture", v, Capture::from_value);
        let capture_names = declared_names(map, "capture");
        v.at("capture", |v| {
            let mut seen = BTreeSet::new();
            for (index, name) in &capture_names {
                if !seen.insert(name.as_str()) {
                    v.at(*index, |v| v.error(format!("duplicate capture name '{name}'")));
                } else if placeholders.contains(name) {
                    v.at(*index, |v| {
                        v.at("name", |v| {
                            v.error(format!("capture '{name}' shadows the placeholder '{name}'"))
                        })
                    });
                }
            }
        });

        let plot = list_items(map, "plot", v, Plot::from_value);
        if let Some(plot) = &plot {
            let mut fields = placeholders;
            fields.extend(capture_names.into_iter().map(|(_, name)| name));
            fields.extend(RESERVED_FIELDS.iter().map(|f| f.to_string()));
            check_plots(plot, &fields, v);
        }

        if v.error_count() > errors_before {
            return None;
        }

        Some(Self {
            command: command?,
            capture: capture?,
            plot: plot?.into_iter().collect::<Option<Vec<_>>>()?,
        })
    }
}

fn check_plots(plots: &[Option<Plot>], fields: &BTreeSet<String>, v: &mut Validator) {
    v.at("plot", |v| {
        for (index, plot) in plots.iter().enumerate() {
            let Some(plot) = plot else {
                continue;
            };
            v.at(index, |v| {
                if !fields.contains(&plot.x_axis) {
                    v.at("x_axis", |v| {
                        v.error(format!("undefined x-axis '{}'", plot.x_axis))
                    });
                }
                if !fields.contains(&plot.y_axis) {
                    v.at("y_axis", |v| {
                        v.error(format!("undefined y-axis '{}'", plot.y_axis))
                    });
                }
                for group in plot.group_by.iter().filter(|g| !fields.contains(*g)) {
                    v.at("group_by", |v| {
                        v.error(format!("undefined group-by '{group}'"))
                    });
                }
            });
        }
    });
}

/// The `name` of every entry of the list under `key`, with its index, whether or not the entry
/// is otherwise valid.
fn declared_names(map: &Map<String, Value>, key: &str) -> Vec<(usize, String)> {
    let Some(Value::Array(items)) = map.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let name = item.get("name")?.as_str()?;
            Some((index, name.to_string()))
        })
        .collect()
}

/// Parse an optional list field, validating every element even after a failure.
fn list_items<T>(
    map: &Map<String, Value>,
    key: &str,
    v: &mut Validator,
    parse: fn(&Value, &mut Validator) -> Option<T>,
) -> Option<Vec<Option<T>>> {
    v.at(key, |v| match map.get(key) {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| v.at(index, |v| parse(item, v)))
                .collect(),
        ),
        Some(other) => {
            v.error(format!("expected a list, got {}", type_name(other)));
            None
        }
    })
}

fn list_of<T>(
    map: &Map<String, Value>,
    key: &str,
    v: &mut Validator,
    parse: fn(&Value, &mut Validator) -> Option<T>,
) -> Option<Vec<T>> {
    list_items(map, key, v, parse)?.into_iter().collect()
}
