use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::Parameters;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template refers to a placeholder that has no value at render time.
    #[error("'{placeholder}' is undefined")]
    Undefined { placeholder: String },
    /// The template contains something between braces that is not a plain placeholder name.
    #[error("invalid placeholder {}, expected '{{{{ name }}}}'", quote_expressions(.expressions))]
    InvalidPlaceholder { expressions: Vec<String> },
}

fn quote_expressions(expressions: &[String]) -> String {
    expressions
        .iter()
        .map(|expression| format!("'{{{{{expression}}}}}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A command line template with `{{ name }}` placeholders.
///
/// Rendering is strict: a placeholder without a matching parameter is an error rather than an
/// empty substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    template: String,
    segments: Vec<Segment>,
    placeholders: BTreeSet<String>,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap())
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Command {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut placeholders = BTreeSet::new();
        let mut invalid = Vec::new();
        let mut last = 0;

        for captures in placeholder_regex().captures_iter(template) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let name = captures[1].trim();
            if !is_identifier(name) {
                invalid.push(captures[1].to_string());
                continue;
            }

            if whole.start() > last {
                segments.push(Segment::Literal(template[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(name.to_string()));
            placeholders.insert(name.to_string());
            last = whole.end();
        }

        if !invalid.is_empty() {
            return Err(TemplateError::InvalidPlaceholder {
                expressions: invalid,
            });
        }
        if last < template.len() {
            segments.push(Segment::Literal(template[last..].to_string()));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
            placeholders,
        })
    }

    /// The valid placeholder names of `template`, even if other placeholders are malformed.
    pub(crate) fn placeholder_names(template: &str) -> BTreeSet<String> {
        placeholder_regex()
            .captures_iter(template)
            .map(|captures| captures[1].trim().to_string())
            .filter(|name| is_identifier(name))
            .collect()
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The names of every placeholder the template refers to.
    pub fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    /// Substitute every placeholder from `parameters`, failing on the first one without a value.
    pub fn render(&self, parameters: &Parameters) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value =
                        parameters
                            .get(name)
                            .ok_or_else(|| TemplateError::Undefined {
                                placeholder: name.clone(),
                            })?;
                    out.push_str(&render_value(value));
                }
            }
        }
        Ok(out)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template)
    }
}

/// The text substituted for a parameter value.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
