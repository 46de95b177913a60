//! Hosts-file registration.
//!
//! Pure content transforms over the hosts file plus thin privileged I/O.
//! Registration is append-if-absent; removal drops only lines that map the
//! domain as an exact hostname token, so removing `shop.test` leaves
//! `myshop.test` alone.

use crate::error::ProvisionError;
use devhost_utils::CommandRunner;
use devhost_utils::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// True when a non-comment `127.0.0.1` line maps `domain` as an exact
    /// hostname token. Mappings to other addresses (`::1`, LAN entries) do
    /// not count: the loopback line is what the provisioner maintains.
    #[must_use]
    pub fn registered(content: &str, domain: &str) -> bool {
        content.lines().any(|line| Self::line_maps(line, domain))
    }

    fn line_maps(line: &str, domain: &str) -> bool {
        let line = line.trim();
        if line.starts_with('#') {
            return false;
        }
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("127.0.0.1") {
            return false;
        }
        tokens.any(|host| host == domain)
    }

    /// Append `127.0.0.1 <domain>` when absent. Returns `None` when the
    /// domain is already registered.
    #[must_use]
    pub fn register_content(content: &str, domain: &str) -> Option<String> {
        if Self::registered(content, domain) {
            return None;
        }
        let mut out = content.trim_end().to_string();
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("127.0.0.1 {domain}\n"));
        Some(out)
    }

    /// Rewrite the content with every `127.0.0.1` line mapping `domain`
    /// removed. Mappings to other addresses are left alone.
    #[must_use]
    pub fn remove_content(content: &str, domain: &str) -> String {
        let mut out: String = content
            .lines()
            .filter(|line| !Self::line_maps(line, domain))
            .collect::<Vec<_>>()
            .join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Register the domain in the hosts file. Returns `true` when a new entry
    /// was appended, `false` when it was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the hosts file cannot be read or the privileged
    /// write fails.
    pub async fn register(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<bool, ProvisionError> {
        let content = fs::read_file(runner, &self.path, false).await?;
        match Self::register_content(&content, domain) {
            Some(updated) => {
                fs::write_file(runner, &self.path, &updated, true).await?;
                info!("registered {domain} in {}", self.path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the domain's entries from the hosts file.
    ///
    /// # Errors
    ///
    /// Returns an error if the hosts file cannot be read or the privileged
    /// write fails.
    pub async fn unregister(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        let content = fs::read_file(runner, &self.path, false).await?;
        if !Self::registered(&content, domain) {
            return Ok(());
        }
        let updated = Self::remove_content(&content, domain);
        fs::write_file(runner, &self.path, &updated, true).await?;
        info!("removed {domain} from {}", self.path.display());
        Ok(())
    }

    /// True when the domain is currently registered on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the hosts file cannot be read.
    pub async fn contains(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<bool, ProvisionError> {
        let content = fs::read_file(runner, &self.path, false).await?;
        Ok(Self::registered(&content, domain))
    }
}
