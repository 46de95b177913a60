//! Self-signed certificate issuance and trust-store management.
//!
//! Certificates live at fixed paths named by domain: the public certificate
//! under the certs directory (world-readable) and the key under the private
//! directory (owner-only). A certificate "exists" only when both files are
//! present.

use crate::config::SystemPaths;
use crate::error::ProvisionError;
use devhost_utils::CommandRunner;
use devhost_utils::fs;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

pub const DEFAULT_VALID_DAYS: u32 = 365;

#[derive(Debug, Clone)]
pub struct CertStore {
    certs_dir: PathBuf,
    private_dir: PathBuf,
    trust_dir: PathBuf,
}

impl CertStore {
    #[must_use]
    pub fn new(certs_dir: PathBuf, private_dir: PathBuf, trust_dir: PathBuf) -> Self {
        Self {
            certs_dir,
            private_dir,
            trust_dir,
        }
    }

    #[must_use]
    pub fn from_paths(paths: &SystemPaths) -> Self {
        Self::new(
            paths.ssl_certs.clone(),
            paths.ssl_private.clone(),
            paths.ca_certificates.clone(),
        )
    }

    #[must_use]
    pub fn cert_path(&self, domain: &str) -> PathBuf {
        self.certs_dir.join(format!("{domain}.crt"))
    }

    #[must_use]
    pub fn key_path(&self, domain: &str) -> PathBuf {
        self.private_dir.join(format!("{domain}.key"))
    }

    fn trust_path(&self, domain: &str) -> PathBuf {
        self.trust_dir.join(format!("{domain}.crt"))
    }

    /// True when both the certificate and the key are on disk.
    #[must_use]
    pub fn exists(&self, domain: &str) -> bool {
        self.cert_path(domain).exists() && self.key_path(domain).exists()
    }

    /// Generate a self-signed certificate for `domain` and write the pair to
    /// the fixed paths.
    ///
    /// Subject equals issuer, CN is the domain, and the SAN extension covers
    /// the domain plus its `www.` alias. The key pair is ECDSA P-256 with a
    /// SHA-256 signature. Certificate permissions end up 0644, key 0600.
    ///
    /// # Errors
    ///
    /// Any generation, serialization, or write failure is reported; no
    /// partial cleanup is attempted.
    pub async fn issue_self_signed(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
        valid_days: u32,
    ) -> Result<(), ProvisionError> {
        let mut params =
            CertificateParams::new(vec![domain.to_string(), format!("www.{domain}")])?;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, domain);
        dn.push(DnType::OrganizationName, "devhost");
        params.distinguished_name = dn;
        params.not_before = OffsetDateTime::now_utc();
        params.not_after = params.not_before + Duration::days(i64::from(valid_days));

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;
        let cert_pem = cert.pem();
        let key_pem = key_pair.serialize_pem();

        let cert_path = self.cert_path(domain);
        let key_path = self.key_path(domain);

        fs::ensure_dir(runner, &self.certs_dir, true).await?;
        fs::ensure_dir(runner, &self.private_dir, true).await?;
        fs::write_file(runner, &cert_path, &cert_pem, true).await?;
        fs::write_file(runner, &key_path, &key_pem, true).await?;
        fs::set_permissions(runner, &cert_path, 0o644, true).await?;
        fs::set_permissions(runner, &key_path, 0o600, true).await?;

        info!("issued self-signed certificate for {domain} ({valid_days} days)");
        Ok(())
    }

    /// Copy the certificate into the system trust directory and rebuild the
    /// trust store.
    ///
    /// # Errors
    ///
    /// Fails when the certificate is absent, or when the copy or trust-store
    /// rebuild fails.
    pub async fn install(
        &self,
        runner: &dyn CommandRunner,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        let cert_path = self.cert_path(domain);
        if !cert_path.exists() {
            return Err(ProvisionError::CertificateMissing { path: cert_path });
        }

        fs::ensure_dir(runner, &self.trust_dir, true).await?;
        fs::copy_file(runner, &cert_path, &self.trust_path(domain), true).await?;

        let out = runner.run_privileged("update-ca-certificates", &[]).await;
        if !out.success() {
            return Err(ProvisionError::from_output("update-ca-certificates", &out));
        }
        info!("installed {domain} certificate into the system trust store");
        Ok(())
    }

    /// Best-effort removal of the certificate, key, and trust-store copy.
    ///
    /// Deleting a non-existent file is not an error, and individual step
    /// failures are logged rather than surfaced; the call always succeeds.
    pub async fn remove(&self, runner: &dyn CommandRunner, domain: &str) {
        for path in [
            self.cert_path(domain),
            self.key_path(domain),
            self.trust_path(domain),
        ] {
            if let Err(e) = fs::remove_file(runner, &path, true).await {
                warn!("failed to remove {}: {e}", path.display());
            }
        }

        let out = runner.run_privileged("update-ca-certificates", &[]).await;
        if !out.success() {
            warn!("trust store rebuild failed: {}", out.stderr.trim());
        }
    }
}
