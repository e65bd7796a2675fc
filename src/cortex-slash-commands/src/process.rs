//! Shell execution for template snippets.
//!
//! Every outcome is rendered into text; nothing here returns an error. The
//! child runs on the tokio process driver, so a slow snippet only suspends the
//! task that awaits it, and a timed-out child is killed when its future drops.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Default timeout for one shell snippet in seconds.
pub const DEFAULT_BASH_TIMEOUT_SECS: u64 = 30;

const LOG_PREVIEW_CHARS: usize = 100;

/// What happened to one shell command.
#[derive(Debug)]
pub enum ProcessOutcome {
    Completed {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    TimedOut(Duration),
    LaunchFailed(std::io::Error),
}

impl ProcessOutcome {
    /// Render the outcome as the text that replaces the snippet.
    ///
    /// Output is stdout followed by stderr, trimmed. A non-zero exit is
    /// prefixed with `[Command exited with code N]`.
    pub fn into_text(self) -> String {
        match self {
            ProcessOutcome::Completed {
                stdout,
                stderr,
                exit_code,
            } => {
                let mut output = stdout;
                if !stderr.is_empty() {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str(&stderr);
                }
                if exit_code != 0 {
                    output = format!("[Command exited with code {exit_code}]\n{output}");
                }
                output.trim().to_string()
            }
            ProcessOutcome::TimedOut(timeout) => {
                format!("[Command timed out after {} seconds]", timeout.as_secs_f64())
            }
            ProcessOutcome::LaunchFailed(e) => format!("[Command failed: {e}]"),
        }
    }
}

/// Runs shell commands in a fixed working directory with a timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: Duration::from_secs(DEFAULT_BASH_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute a shell command and return its rendered output.
    pub async fn run(&self, command: &str) -> String {
        self.execute(command).await.into_text()
    }

    /// Execute a shell command and return the raw outcome.
    pub async fn execute(&self, command: &str) -> ProcessOutcome {
        info!("Executing bash command: {}", preview(command));

        let mut cmd = shell_command(command);
        cmd.current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                warn!(
                    "Bash command timed out after {:?}: {}",
                    self.timeout,
                    preview(command)
                );
                return ProcessOutcome::TimedOut(self.timeout);
            }
            Ok(Err(e)) => {
                error!("Bash execution failed: {}", e);
                return ProcessOutcome::LaunchFailed(e);
            }
            Ok(Ok(output)) => output,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!("Bash command exited with code {}", exit_code);

        ProcessOutcome::Completed {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        }
    }
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn preview(command: &str) -> String {
    if command.chars().count() > LOG_PREVIEW_CHARS {
        let head: String = command.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        command.to_string()
    }
}
