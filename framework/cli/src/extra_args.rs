use std::sync::OnceLock;

use anyhow::bail;
use regex::Regex;
use serde_json::Value;
use spinner_core::Parameters;

fn extra_args_regex() -> &'static Regex {
    static EXTRA_ARGS_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    EXTRA_ARGS_RE.get_or_init(|| Regex::new(r"^(\w+)=([^;]+)(;(\w+)=([^;]+))*;?$").unwrap())
}

/// Parse `key=value;key=value` into extra parameters.
///
/// Numbers, booleans and lists are read as such. Anything else, including comma separated text
/// like `nodeA,nodeB`, stays a string.
pub fn parse_extra_args(s: &str) -> anyhow::Result<Parameters> {
    if !extra_args_regex().is_match(s) {
        bail!("Expected a list of key=value pairs separated by semicolons, got '{s}'");
    }

    let mut parameters = Parameters::new();
    for pair in s.split(';').filter(|pair| !pair.is_empty()) {
        // The regex guarantees every pair has a key and a value
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Missing value in '{pair}'");
        };
        parameters.insert(key.to_string(), parse_value(value));
    }
    Ok(parameters)
}

fn parse_value(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Array(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}
