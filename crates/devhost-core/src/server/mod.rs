//! Per-web-server capability strategies.
//!
//! Apache and Nginx differ in where site files live, how a site is enabled,
//! and whether the configuration can be syntax-checked before a reload. The
//! orchestration in [`crate::vhost`] is server-agnostic; everything
//! server-specific sits behind [`WebServer`].

mod apache;
mod nginx;

pub use apache::Apache;
pub use nginx::Nginx;

use crate::config::SystemPaths;
use crate::error::ProvisionError;
use async_trait::async_trait;
use devhost_utils::CommandRunner;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Apache,
    Nginx,
}

impl ServerKind {
    /// Parse a server name as configured or supplied on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnsupportedServer`] for anything other than
    /// Apache or Nginx.
    pub fn parse(name: &str) -> Result<Self, ProvisionError> {
        match name {
            "apache2" | "apache" => Ok(Self::Apache),
            "nginx" => Ok(Self::Nginx),
            other => Err(ProvisionError::UnsupportedServer {
                name: other.to_string(),
            }),
        }
    }

    /// The systemd unit this server runs as.
    #[must_use]
    pub const fn service(self) -> &'static str {
        match self {
            Self::Apache => "apache2",
            Self::Nginx => "nginx",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service())
    }
}

/// Capability interface for one web server.
#[async_trait]
pub trait WebServer: Send + Sync + fmt::Debug {
    fn kind(&self) -> ServerKind;

    /// Where the site configuration for `domain` is written.
    fn site_path(&self, domain: &str) -> PathBuf;

    /// Template file names: main vhost template and the SSL block.
    fn template_name(&self) -> &'static str;
    fn ssl_template_name(&self) -> &'static str;

    /// Write the rendered configuration to the sites-available location.
    async fn write_config(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
        rendered: &str,
    ) -> Result<PathBuf, ProvisionError>;

    /// Activate the site registration (symlink or a2ensite). This performs
    /// exactly one mutation so callers can ledger it atomically.
    async fn enable(&self, runner: &dyn CommandRunner, domain: &str) -> Result<(), ProvisionError>;

    /// Enable server modules the rendered configuration depends on. Runs
    /// after the site registration is ledgered; servers without a module
    /// system keep the default no-op.
    async fn enable_modules(&self, _runner: &dyn CommandRunner) -> Result<(), ProvisionError> {
        Ok(())
    }

    /// Deactivate the site registration.
    async fn disable(&self, runner: &dyn CommandRunner, domain: &str)
        -> Result<(), ProvisionError>;

    /// Delete the site configuration file.
    async fn delete_config(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<(), ProvisionError>;

    /// Syntax-check the server configuration where the server supports it.
    async fn test_config(&self, runner: &dyn CommandRunner) -> Result<(), ProvisionError>;

    /// True when the site registration (symlink / enabled state) is present.
    fn enabled_marker(&self, domain: &str) -> Option<PathBuf>;
}

/// Select the strategy for a server kind.
#[must_use]
pub fn server_for(kind: ServerKind, paths: &SystemPaths) -> Box<dyn WebServer> {
    match kind {
        ServerKind::Apache => Box::new(Apache::new(paths.apache_sites.clone())),
        ServerKind::Nginx => Box::new(Nginx::new(
            paths.nginx_sites.clone(),
            paths.nginx_enabled.clone(),
        )),
    }
}
