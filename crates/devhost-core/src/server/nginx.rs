//! Nginx strategy.
//!
//! Site files are `<sites-available>/<domain>` and enabling means a symlink
//! in sites-enabled. Nginx supports `nginx -t`, so the configuration is
//! syntax-checked before any reload.

use super::{ServerKind, WebServer};
use crate::error::ProvisionError;
use async_trait::async_trait;
use devhost_utils::CommandRunner;
use devhost_utils::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Nginx {
    sites_available: PathBuf,
    sites_enabled: PathBuf,
}

impl Nginx {
    #[must_use]
    pub const fn new(sites_available: PathBuf, sites_enabled: PathBuf) -> Self {
        Self {
            sites_available,
            sites_enabled,
        }
    }

    fn symlink_path(&self, domain: &str) -> PathBuf {
        self.sites_enabled.join(domain)
    }
}

#[async_trait]
impl WebServer for Nginx {
    fn kind(&self) -> ServerKind {
        ServerKind::Nginx
    }

    fn site_path(&self, domain: &str) -> PathBuf {
        self.sites_available.join(domain)
    }

    fn template_name(&self) -> &'static str {
        "nginx_vhost.conf"
    }

    fn ssl_template_name(&self) -> &'static str {
        "nginx_ssl.conf"
    }

    async fn write_config(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
        rendered: &str,
    ) -> Result<PathBuf, ProvisionError> {
        let path = self.site_path(domain);
        fs::ensure_dir(runner, &self.sites_available, true).await?;
        fs::write_file(runner, &path, rendered, true).await?;
        Ok(path)
    }

    async fn enable(&self, runner: &dyn CommandRunner, domain: &str) -> Result<(), ProvisionError> {
        fs::ensure_dir(runner, &self.sites_enabled, true).await?;
        let from = self.site_path(domain).to_string_lossy().into_owned();
        let to = self.symlink_path(domain).to_string_lossy().into_owned();
        let out = runner.run_privileged("ln", &["-sf", &from, &to]).await;
        if !out.success() {
            return Err(ProvisionError::from_output(format!("ln -sf {from} {to}"), &out));
        }
        Ok(())
    }

    async fn disable(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        fs::remove_file(runner, &self.symlink_path(domain), true).await?;
        Ok(())
    }

    async fn delete_config(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        fs::remove_file(runner, &self.site_path(domain), true).await?;
        Ok(())
    }

    async fn test_config(&self, runner: &dyn CommandRunner) -> Result<(), ProvisionError> {
        let out = runner.run_privileged("nginx", &["-t"]).await;
        if out.cancelled() {
            return Err(ProvisionError::AuthenticationCancelled);
        }
        if !out.success() {
            return Err(ProvisionError::ConfigInvalid {
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn enabled_marker(&self, domain: &str) -> Option<PathBuf> {
        Some(self.symlink_path(domain))
    }
}
