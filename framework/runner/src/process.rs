use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::time::Instant;

/// Exit code recorded for an attempt that was killed because it ran out of time.
pub const TIMEOUT_CODE: i32 = -1;

/// What a single attempt at running a command produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl Outcome {
    /// Standard output and standard error joined by a newline, which is what captures read.
    pub fn output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Run `command` through `shell -c` and wait for it, at most `timeout` if one is given.
///
/// The child leads its own process group. On timeout the whole group is terminated, so commands
/// that spawn their own children do not outlive the attempt.
pub async fn run_command(
    shell: &Path,
    command: &str,
    timeout: Option<Duration>,
) -> std::io::Result<Outcome> {
    let mut cmd = tokio::process::Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let child = cmd.spawn()?;
    let pid = child.id();
    let wait = child.wait_with_output();

    let output = match timeout {
        None => wait.await?,
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(output) => output?,
            Err(_) => {
                kill_group(pid);
                return Ok(Outcome {
                    code: TIMEOUT_CODE,
                    stdout: String::new(),
                    stderr: format!("Timeout error (limit: {}s)", limit.as_secs_f64()),
                    elapsed: start.elapsed(),
                    timed_out: true,
                });
            }
        },
    };

    Ok(Outcome {
        code: exit_code(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed: start.elapsed(),
        timed_out: false,
    })
}

/// A process killed by a signal reports the negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(TIMEOUT_CODE)
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    log::debug!("Killing process group {pid}");
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGTERM) {
        // ESRCH when everything in the group already exited
        log::debug!("Failed to kill process group {pid}, probably already dead: {e}");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
