//! Privileged command bridge.
//!
//! Every mutation of shared system state (hosts file, sites directories,
//! certificate store) funnels through [`CommandRunner`]. Commands are always
//! parameterized (program + argument slice); nothing here assembles shell
//! strings, so user-controlled values never reach a shell.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Exit code PolicyKit returns when the user dismisses the elevation prompt.
pub const AUTH_CANCELLED_CODE: i32 = 126;

/// Structured result of a subprocess invocation.
///
/// The bridge never raises: launch failures (missing binary, environment
/// problems) are converted into a failing `CommandOutput` carrying the error
/// text as `stderr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// True when the privilege prompt was dismissed rather than the command
    /// failing on its own.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.code == AUTH_CANCELLED_CODE
    }

    fn launch_failure(err: &dyn fmt::Display) -> Self {
        Self {
            code: 1,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }
}

/// Capability seam for command execution.
///
/// Production code uses [`Elevator`]; tests substitute a scripted
/// implementation so provisioning flows can run against temp directories.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Run a command with the caller's own rights.
    async fn run(&self, program: &str, args: &[&str]) -> CommandOutput;

    /// Run a command with elevated rights, wrapping it in the escalation
    /// prompt when the process is not already privileged.
    async fn run_privileged(&self, program: &str, args: &[&str]) -> CommandOutput;

    /// True when the process already holds elevated rights and file I/O can
    /// skip the bridge entirely.
    fn already_elevated(&self) -> bool;
}

/// Production [`CommandRunner`] backed by `pkexec`.
#[derive(Debug, Clone)]
pub struct Elevator {
    pkexec: Option<PathBuf>,
    elevated: bool,
}

impl Default for Elevator {
    fn default() -> Self {
        Self::new()
    }
}

impl Elevator {
    /// Probe the environment: effective uid and the location of `pkexec`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pkexec: which("pkexec"),
            elevated: nix::unistd::geteuid().is_root(),
        }
    }

    /// Verify the escalation prompt is usable before any privileged work.
    ///
    /// # Errors
    ///
    /// Returns an error when the process is unprivileged and `pkexec` is not
    /// on `PATH`, which is a fatal configuration problem reported at startup.
    pub fn require_escalation_tool(&self) -> anyhow::Result<()> {
        if self.elevated || self.pkexec.is_some() {
            return Ok(());
        }
        anyhow::bail!(
            "pkexec is not installed; install PolicyKit (e.g. `sudo apt-get install policykit-1`) \
             or run devhost as root"
        )
    }

    async fn exec(mut cmd: Command, cmd_display: &str) -> CommandOutput {
        debug!("executing: {}", cmd_display);
        match cmd.output().await {
            Ok(out) => CommandOutput {
                code: out.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            },
            Err(e) => CommandOutput::launch_failure(&e),
        }
    }
}

#[async_trait]
impl CommandRunner for Elevator {
    async fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        let mut cmd = Command::new(program);
        cmd.args(args);
        Self::exec(cmd, &format!("{program} {}", args.join(" "))).await
    }

    async fn run_privileged(&self, program: &str, args: &[&str]) -> CommandOutput {
        if self.elevated {
            return self.run(program, args).await;
        }

        let Some(pkexec) = &self.pkexec else {
            return CommandOutput::launch_failure(&"pkexec not available");
        };

        let mut cmd = Command::new(pkexec);
        cmd.arg(program);
        cmd.args(args);
        let mut out = Self::exec(cmd, &format!("pkexec {program} {}", args.join(" "))).await;
        if out.cancelled() {
            out.stderr = "Authentication cancelled by user".to_string();
        }
        out
    }

    fn already_elevated(&self) -> bool {
        self.elevated
    }
}

/// Resolve a binary on `PATH`.
#[must_use]
pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
