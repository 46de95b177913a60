use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devhost")]
#[command(version)]
#[command(about = "Local web development environment manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage virtual hosts
    Vhost {
        #[command(subcommand)]
        command: VhostCommands,
    },
    /// Manage self-signed TLS certificates
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },
    /// Inspect and edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Check host readiness for privileged provisioning
    Doctor,
}

#[derive(Subcommand)]
pub enum VhostCommands {
    /// Create a virtual host for a project
    ///
    /// The domain is derived from the sanitized project name plus the
    /// configured suffix (e.g. `shop` -> `shop.test`) unless --domain is
    /// given.
    Create {
        /// Project name
        project: String,
        /// Document root (default: <projects_root>/<project>)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Target web server: apache2 or nginx (default: configured default)
        #[arg(long)]
        server: Option<String>,
        /// PHP-FPM version referenced by the rendered config
        #[arg(long)]
        php: Option<String>,
        /// Issue a self-signed certificate and render the SSL block
        #[arg(long)]
        ssl: bool,
        /// Custom domain instead of the derived one
        #[arg(long)]
        domain: Option<String>,
    },
    /// Remove a virtual host (best-effort; prints per-step outcomes)
    Remove {
        /// Domain to tear down
        domain: String,
        /// Web server the vhost was created for (default: configured default)
        #[arg(long)]
        server: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CertCommands {
    /// Issue a self-signed certificate for a domain
    Issue {
        domain: String,
        /// Validity window in days
        #[arg(long, default_value_t = 365)]
        days: u32,
    },
    /// Copy an issued certificate into the system trust store
    Install { domain: String },
    /// Remove a certificate, its key, and its trust-store copy
    Remove { domain: String },
    /// Show whether a certificate pair exists for a domain
    Status { domain: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a configuration value by dotted key
    Get { key: String },
    /// Set a configuration value by dotted key and persist it
    Set { key: String, value: String },
    /// Delete the user configuration file and restore defaults
    Reset,
}
