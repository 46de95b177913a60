//! Apache strategy.
//!
//! Site files are `<sites-available>/<domain>.conf`; enabling goes through
//! `a2ensite`, which manages the sites-enabled registration itself. Apache
//! has no pre-reload syntax check in this flow.

use super::{ServerKind, WebServer};
use crate::error::ProvisionError;
use async_trait::async_trait;
use devhost_utils::CommandRunner;
use devhost_utils::fs;
use std::path::PathBuf;
use tracing::warn;

/// Modules required by the generated vhosts (rewrite rules, TLS, PHP-FPM).
const REQUIRED_MODULES: [&str; 3] = ["rewrite", "ssl", "proxy_fcgi"];

#[derive(Debug)]
pub struct Apache {
    sites_available: PathBuf,
}

impl Apache {
    #[must_use]
    pub const fn new(sites_available: PathBuf) -> Self {
        Self { sites_available }
    }

    fn conf_name(domain: &str) -> String {
        format!("{domain}.conf")
    }
}

#[async_trait]
impl WebServer for Apache {
    fn kind(&self) -> ServerKind {
        ServerKind::Apache
    }

    fn site_path(&self, domain: &str) -> PathBuf {
        self.sites_available.join(Self::conf_name(domain))
    }

    fn template_name(&self) -> &'static str {
        "apache_vhost.conf"
    }

    fn ssl_template_name(&self) -> &'static str {
        "apache_ssl.conf"
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
        let conf = Self::conf_name(domain);
        let out = runner.run_privileged("a2ensite", &[&conf]).await;
        if !out.success() {
            return Err(ProvisionError::from_output(format!("a2ensite {conf}"), &out));
        }
        Ok(())
    }

    async fn enable_modules(&self, runner: &dyn CommandRunner) -> Result<(), ProvisionError> {
        // Module enablement is idempotent; a failure here leaves the site
        // functional for plain setups, so it is logged rather than fatal.
        for module in REQUIRED_MODULES {
            let out = runner.run_privileged("a2enmod", &[module]).await;
            if out.cancelled() {
                return Err(ProvisionError::AuthenticationCancelled);
            }
            if !out.success() {
                warn!("a2enmod {module} failed: {}", out.stderr.trim());
            }
        }
        Ok(())
    }

    async fn disable(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        let conf = Self::conf_name(domain);
        let out = runner.run_privileged("a2dissite", &[&conf]).await;
        if !out.success() {
            return Err(ProvisionError::from_output(format!("a2dissite {conf}"), &out));
        }
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

    async fn test_config(&self, _runner: &dyn CommandRunner) -> Result<(), ProvisionError> {
        // No pre-reload check for Apache in this flow.
        Ok(())
    }

    fn enabled_marker(&self, _domain: &str) -> Option<PathBuf> {
        // a2ensite owns the sites-enabled registration; there is no path we
        // can probe portably, so removal always attempts a2dissite.
        None
    }
}
