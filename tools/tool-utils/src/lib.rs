//! Helpers for invoking external tooling from the deploy scripts

use std::ffi::OsStr;
use std::fmt::{self, Display};
use std::process::Stdio;
use std::time::Duration;

use eyre::{eyre, Result};
use tokio::process::Command;

/// The captured result of a finished external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Whether the command exited with a zero status
    pub success: bool,
    /// The exit code, if the process exited normally
    pub code: Option<i32>,
    /// Everything the command wrote to stdout
    pub stdout: String,
    /// Everything the command wrote to stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Whether `needle` appears in either output stream, ignoring case
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout.to_lowercase().contains(&needle) || self.stderr.to_lowercase().contains(&needle)
    }
}

impl Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}")?,
            None => write!(f, "terminated by signal")?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

/// Render a program and its arguments the way a user would type them
pub fn display_command<I, S>(program: &str, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.as_ref().to_string_lossy());
    }
    rendered
}

/// Execute a command to completion, capturing both output streams
///
/// A non-zero exit status is *not* an error here; callers inspect
/// [`CommandOutput::success`] and the captured text to classify the result.
/// Spawn failures and exceeding `timeout` are errors.
pub async fn run_command(mut cmd: Command, timeout: Duration) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    // Make sure a timed out child does not outlive us
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| eyre!("failed to spawn command: {e}"))?;
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| eyre!("command timed out after {}s", timeout.as_secs()))?
        .map_err(|e| eyre!("failed to wait on command: {e}"))?;

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let rendered = display_command("npx", ["hardhat", "verify", "0xabc"]);
        assert_eq!(rendered, "npx hardhat verify 0xabc");
    }

    #[test]
    fn test_contains_ignore_case() {
        let output = CommandOutput {
            stdout: "Contract source code already verified".to_string(),
            ..Default::default()
        };
        assert!(output.contains_ignore_case("Already Verified"));
        assert!(!output.contains_ignore_case("Successfully verified"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_captures_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err 1>&2; exit 3");
        let output = run_command(cmd, Duration::from_secs(10)).await.unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        assert!(run_command(cmd, Duration::from_millis(50)).await.is_err());
    }
}
