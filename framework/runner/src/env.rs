use std::collections::BTreeMap;

use spinner_core::EnvCapture;

/// Capture the environment variables selected by `capture`.
///
/// Variables that are not set, or whose name or value is not valid unicode, are left out.
pub fn snapshot(capture: &EnvCapture) -> BTreeMap<String, String> {
    match capture {
        EnvCapture::All => std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect(),
        EnvCapture::Only(names) => names
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
            .collect(),
    }
}
