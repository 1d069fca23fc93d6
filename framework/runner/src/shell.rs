use std::env;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;

use crate::types::SpinnerResult;

/// Environment variable to override the shell used to run benchmark commands.
pub const SPINNER_SHELL_ENV: &str = "SPINNER_SHELL";

/// Get the path to the shell that runs command lines with `-c`.
///
/// If the [`SPINNER_SHELL_ENV`] environment variable is set, its value is used as the path to the
/// shell. If it is not set, `sh` is looked up in the system's PATH.
pub fn shell_path() -> SpinnerResult<PathBuf> {
    resolve_shell(env::var(SPINNER_SHELL_ENV).ok().as_deref())
}

fn resolve_shell(configured: Option<&str>) -> SpinnerResult<PathBuf> {
    match configured {
        Some("") => {
            bail!("'{SPINNER_SHELL_ENV}' set to empty string");
        }
        Some("sh") | None => which::which("sh").with_context(|| {
            format!("Shell 'sh' not found in PATH. Set '{SPINNER_SHELL_ENV}' to the shell to use.")
        }),
        Some(path) => {
            let shell_path = PathBuf::from(path);
            if !shell_path.exists() {
                bail!(
                    "Shell overwritten with '{SPINNER_SHELL_ENV}={path}' but that path doesn't exist",
                    path = shell_path.display()
                );
            }
            Ok(shell_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn missing_shell_path() {
        assert!(resolve_shell(Some("/non/existent/path/to/sh")).is_err());
    }

    #[test]
    fn empty_shell_path() {
        assert!(resolve_shell(Some("")).is_err());
    }

    #[test]
    fn configured_shell_path() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let test_path = temp.path().to_str().expect("failed to get temp file path");
        let result = resolve_shell(Some(test_path)).expect("failed to get shell path");
        assert_eq!(result, PathBuf::from(test_path));
    }

    #[cfg(unix)]
    #[test]
    fn default_shell_is_found_on_path() {
        let result = resolve_shell(None).expect("failed to find sh");
        assert!(result.ends_with("sh"));
    }
}
