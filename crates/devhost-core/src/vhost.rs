//! Virtual host provisioning.
//!
//! A virtual host has no record of its own; it exists as three independently
//! mutable artifacts (site config, enabled registration, hosts entry) plus an
//! optional certificate pair. Creation runs as an ordered step list with
//! every completed mutating step recorded, and a failure before the final
//! reload undoes the completed steps in reverse so no inconsistent partial
//! vhost is left behind. Removal is best-effort by design and always reports
//! per-step outcomes instead of a single boolean.

use crate::cert::{CertStore, DEFAULT_VALID_DAYS};
use crate::config::SystemPaths;
use crate::error::ProvisionError;
use crate::hosts::HostsFile;
use crate::server::{ServerKind, WebServer, server_for};
use crate::service;
use crate::template::{self, TemplateVars};
use crate::validate::{sanitize_domain, validate_domain};
use devhost_utils::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct VhostRequest {
    pub project_name: String,
    pub document_root: PathBuf,
    pub server: ServerKind,
    pub php_version: String,
    pub enable_ssl: bool,
    pub custom_domain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProvisionReceipt {
    pub domain: String,
    pub site_path: PathBuf,
    pub ssl: bool,
}

/// Mutating steps recorded during creation, in completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletedStep {
    CertIssued,
    ConfigWritten,
    SiteEnabled,
    HostsRegistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalAction {
    DisableSite,
    DeleteConfig,
    ReloadService,
    UnregisterHosts,
}

impl fmt::Display for RemovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisableSite => write!(f, "disable site"),
            Self::DeleteConfig => write!(f, "delete configuration"),
            Self::ReloadService => write!(f, "reload service"),
            Self::UnregisterHosts => write!(f, "remove hosts entry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    /// Nothing to do; the artifact was already absent.
    Skipped,
    Failed(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalStep {
    pub action: RemovalAction,
    pub outcome: StepOutcome,
}

/// Outcome of a best-effort removal. The overall operation always succeeds;
/// the report distinguishes "fully removed" from "removed with no-ops or
/// failed steps".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalReport {
    pub domain: String,
    pub steps: Vec<RemovalStep>,
}

impl RemovalReport {
    /// No step failed (no-ops are fine).
    #[must_use]
    pub fn clean(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    /// At least one artifact was actually removed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| s.outcome == StepOutcome::Done)
    }
}

#[derive(Debug)]
pub struct VhostManager {
    runner: Arc<dyn CommandRunner>,
    paths: SystemPaths,
    domain_suffix: String,
    certs: CertStore,
    hosts: HostsFile,
    /// Serializes create/remove: the hosts file and sites directories are
    /// shared mutable state with read-modify-write sequences.
    lock: Mutex<()>,
}

impl VhostManager {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, paths: SystemPaths, domain_suffix: String) -> Self {
        let certs = CertStore::from_paths(&paths);
        let hosts = HostsFile::new(paths.hosts_file.clone());
        Self {
            runner,
            paths,
            domain_suffix,
            certs,
            hosts,
            lock: Mutex::new(()),
        }
    }

    /// The domain a request will provision: the sanitized custom domain when
    /// supplied, otherwise the sanitized project name plus the configured
    /// suffix.
    #[must_use]
    pub fn resolve_domain(&self, req: &VhostRequest) -> String {
        match &req.custom_domain {
            Some(custom) => sanitize_domain(custom),
            None => format!("{}{}", sanitize_domain(&req.project_name), self.domain_suffix),
        }
    }

    /// Create a virtual host: certificate (when requested), rendered server
    /// configuration, enabled registration, hosts entry, service reload.
    ///
    /// # Errors
    ///
    /// Validation failures are returned before anything is touched. A failure
    /// after mutation starts rolls back the completed steps, except a reload
    /// failure, which is reported as [`ProvisionError::PartialProvisioning`]
    /// with the installed artifacts left in place.
    pub async fn create(&self, req: &VhostRequest) -> Result<ProvisionReceipt, ProvisionError> {
        let _guard = self.lock.lock().await;

        let domain = self.resolve_domain(req);
        if !validate_domain(&domain) {
            return Err(ProvisionError::InvalidDomain { domain });
        }
        if !req.document_root.exists() {
            return Err(ProvisionError::DocRootMissing {
                path: req.document_root.clone(),
            });
        }

        let server = server_for(req.server, &self.paths);
        let mut completed: Vec<CompletedStep> = Vec::new();

        match self
            .run_steps(req, &domain, server.as_ref(), &mut completed)
            .await
        {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                // A failed reload leaves a consistent (if not yet served)
                // vhost behind; everything earlier gets compensated.
                if !matches!(e, ProvisionError::PartialProvisioning { .. }) {
                    self.undo(&completed, &domain, server.as_ref()).await;
                }
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        req: &VhostRequest,
        domain: &str,
        server: &dyn WebServer,
        completed: &mut Vec<CompletedStep>,
    ) -> Result<ProvisionReceipt, ProvisionError> {
        let runner = self.runner.as_ref();

        // The certificate must exist before the rendered config references it.
        if req.enable_ssl && !self.certs.exists(domain) {
            self.certs
                .issue_self_signed(runner, domain, DEFAULT_VALID_DAYS)
                .await?;
            completed.push(CompletedStep::CertIssued);
        }

        let rendered = self.render(req, domain, server).await?;

        let site_path = server.write_config(runner, domain, &rendered).await?;
        completed.push(CompletedStep::ConfigWritten);

        server.enable(runner, domain).await?;
        completed.push(CompletedStep::SiteEnabled);

        server.enable_modules(runner).await?;

        server.test_config(runner).await?;

        if self.hosts.register(runner, domain).await? {
            completed.push(CompletedStep::HostsRegistered);
        }

        let unit = server.kind().service();
        let out = service::reload(runner, unit).await;
        if !out.success() {
            return Err(ProvisionError::PartialProvisioning {
                service: unit.to_string(),
                stderr: out.stderr.trim().to_string(),
            });
        }

        info!("virtual host created: {domain} ({unit})");
        Ok(ProvisionReceipt {
            domain: domain.to_string(),
            site_path,
            ssl: req.enable_ssl,
        })
    }

    async fn render(
        &self,
        req: &VhostRequest,
        domain: &str,
        server: &dyn WebServer,
    ) -> Result<String, ProvisionError> {
        let main = template::load(&self.paths.templates, server.template_name()).await?;
        let document_root = req.document_root.to_string_lossy();

        let ssl_block = if req.enable_ssl {
            let ssl_template =
                template::load(&self.paths.templates, server.ssl_template_name()).await?;
            let cert_path = self.certs.cert_path(domain);
            let key_path = self.certs.key_path(domain);
            template::render(
                &ssl_template,
                &TemplateVars {
                    domain,
                    document_root: &document_root,
                    php_version: &req.php_version,
                    ssl_cert: &cert_path.to_string_lossy(),
                    ssl_key: &key_path.to_string_lossy(),
                    ssl_config: "",
                },
            )
        } else {
            String::new()
        };

        Ok(template::render(
            &main,
            &TemplateVars {
                domain,
                document_root: &document_root,
                php_version: &req.php_version,
                ssl_config: &ssl_block,
                ssl_cert: "",
                ssl_key: "",
            },
        ))
    }

    /// Best-effort compensation, newest step first. Failures are logged, not
    /// raised: the original error is what the caller needs to see.
    async fn undo(&self, completed: &[CompletedStep], domain: &str, server: &dyn WebServer) {
        let runner = self.runner.as_ref();
        for step in completed.iter().rev() {
            let result = match step {
                CompletedStep::HostsRegistered => self.hosts.unregister(runner, domain).await,
                CompletedStep::SiteEnabled => server.disable(runner, domain).await,
                CompletedStep::ConfigWritten => server.delete_config(runner, domain).await,
                CompletedStep::CertIssued => {
                    self.certs.remove(runner, domain).await;
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!("rollback of {step:?} for {domain} failed: {e}");
            }
        }
    }

    /// Tear down a virtual host. Every step runs regardless of earlier
    /// failures and the call itself always succeeds; consult the report for
    /// per-step outcomes.
    pub async fn remove(&self, domain: &str, kind: ServerKind) -> RemovalReport {
        let _guard = self.lock.lock().await;

        let server = server_for(kind, &self.paths);
        let runner = self.runner.as_ref();
        let mut steps = Vec::new();

        let site_path = server.site_path(domain);
        let site_exists = site_path.exists();

        // Enabled registration. For nginx the symlink is probed directly
        // (dangling links included); Apache's registration is owned by
        // a2dissite, so it is attempted whenever the site file exists.
        let disable_outcome = match server.enabled_marker(domain) {
            Some(marker) if marker.symlink_metadata().is_err() => StepOutcome::Skipped,
            None if !site_exists => StepOutcome::Skipped,
            _ => match server.disable(runner, domain).await {
                Ok(()) => StepOutcome::Done,
                Err(e) => StepOutcome::Failed(e.to_string()),
            },
        };
        steps.push(RemovalStep {
            action: RemovalAction::DisableSite,
            outcome: disable_outcome,
        });

        let delete_outcome = if site_exists {
            match server.delete_config(runner, domain).await {
                Ok(()) => StepOutcome::Done,
                Err(e) => StepOutcome::Failed(e.to_string()),
            }
        } else {
            StepOutcome::Skipped
        };
        steps.push(RemovalStep {
            action: RemovalAction::DeleteConfig,
            outcome: delete_outcome,
        });

        // Reload only when something actually changed.
        let reload_outcome = if steps.iter().any(|s| s.outcome == StepOutcome::Done) {
            let out = service::reload(runner, kind.service()).await;
            if out.success() {
                StepOutcome::Done
            } else {
                StepOutcome::Failed(out.stderr.trim().to_string())
            }
        } else {
            StepOutcome::Skipped
        };
        steps.push(RemovalStep {
            action: RemovalAction::ReloadService,
            outcome: reload_outcome,
        });

        let hosts_outcome = match self.hosts.contains(runner, domain).await {
            Ok(false) => StepOutcome::Skipped,
            Ok(true) => match self.hosts.unregister(runner, domain).await {
                Ok(()) => StepOutcome::Done,
                Err(e) => StepOutcome::Failed(e.to_string()),
            },
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        steps.push(RemovalStep {
            action: RemovalAction::UnregisterHosts,
            outcome: hosts_outcome,
        });

        let report = RemovalReport {
            domain: domain.to_string(),
            steps,
        };
        for step in &report.steps {
            if let StepOutcome::Failed(reason) = &step.outcome {
                warn!("removal of {domain}: {} failed: {reason}", step.action);
            }
        }
        info!(
            "virtual host removal finished for {domain} (changed: {})",
            report.changed()
        );
        report
    }
}
