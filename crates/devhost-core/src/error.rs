//! Error taxonomy for the provisioning pipeline.
//!
//! Validation errors are returned before any side effect; bridge outcomes are
//! mapped into structured variants at the boundary, so no I/O or subprocess
//! error escapes a component as a panic or untyped failure.

use devhost_utils::CommandOutput;
use devhost_utils::fs::FsError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("invalid domain name: {domain}")]
    InvalidDomain { domain: String },

    #[error("document root does not exist: {}", path.display())]
    DocRootMissing { path: PathBuf },

    #[error("invalid {what}: {value}")]
    InvalidInput { what: &'static str, value: String },

    #[error("authentication cancelled by user")]
    AuthenticationCancelled,

    #[error("`{command}` failed with status {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to load template {}", path.display())]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server configuration test failed: {stderr}")]
    ConfigInvalid { stderr: String },

    /// The vhost is installed and registered but the server is not yet
    /// serving it; nothing is rolled back.
    #[error("{service} reload failed; configuration and hosts entry were left in place: {stderr}")]
    PartialProvisioning { service: String, stderr: String },

    #[error("unsupported web server: {name}")]
    UnsupportedServer { name: String },

    #[error("certificate not found: {}", path.display())]
    CertificateMissing { path: PathBuf },

    #[error("certificate generation failed")]
    Certificate(#[from] rcgen::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Map a non-success bridge result into the matching variant.
    pub fn from_output(command: impl Into<String>, out: &CommandOutput) -> Self {
        if out.cancelled() {
            return Self::AuthenticationCancelled;
        }
        Self::CommandFailed {
            command: command.into(),
            code: out.code,
            stderr: out.stderr.trim().to_string(),
        }
    }
}

impl From<FsError> for ProvisionError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Cancelled => Self::AuthenticationCancelled,
            FsError::Command {
                command,
                code,
                stderr,
            } => Self::CommandFailed {
                command,
                code,
                stderr,
            },
            FsError::Io(e) => Self::Io(e),
        }
    }
}
