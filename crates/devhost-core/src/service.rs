//! Service controller collaborator.
//!
//! The provisioner calls `reload` exactly once per create/remove and only
//! interprets the exit code; stdout is ignored.

use devhost_utils::{CommandOutput, CommandRunner};

/// Reload (not restart) a systemd unit.
pub async fn reload(runner: &dyn CommandRunner, unit: &str) -> CommandOutput {
    runner.run_privileged("systemctl", &["reload", unit]).await
}

/// True when the unit reports `active`.
pub async fn is_active(runner: &dyn CommandRunner, unit: &str) -> bool {
    runner.run("systemctl", &["is-active", unit]).await.success()
}
