//! Host readiness checks.
//!
//! Mirrors what the provisioning pipeline will need at runtime: a working
//! privilege escalation path, at least one supported web server, and the
//! files the pipeline reads.

use crate::style;
use anyhow::Result;
use devhost_core::{ConfigStore, SystemPaths, service};
use devhost_utils::elevate::which;
use devhost_utils::{CommandRunner, Elevator};

const TEMPLATE_NAMES: [&str; 4] = [
    "apache_vhost.conf",
    "apache_ssl.conf",
    "nginx_vhost.conf",
    "nginx_ssl.conf",
];

pub async fn run(config: &ConfigStore, elevator: &Elevator) -> Result<()> {
    let paths = SystemPaths::from_config(config);
    let mut critical = false;

    if elevator.already_elevated() {
        println!("{} running with elevated rights", style::CHECK);
    } else if which("pkexec").is_some() {
        println!("{} pkexec available for privilege escalation", style::CHECK);
    } else {
        critical = true;
        println!(
            "{} pkexec not found; install PolicyKit (e.g. `sudo apt-get install policykit-1`)",
            style::CROSS
        );
    }

    for (label, binary, unit) in [("apache", "apache2ctl", "apache2"), ("nginx", "nginx", "nginx")]
    {
        if which(binary).is_some() {
            let state = if service::is_active(elevator, unit).await {
                "active"
            } else {
                "inactive"
            };
            println!("{} {label} installed ({state})", style::CHECK);
        } else {
            println!("{} {label} not installed", style::WARN);
        }
    }

    if paths.hosts_file.exists() {
        println!("{} hosts file at {}", style::CHECK, paths.hosts_file.display());
    } else {
        critical = true;
        println!(
            "{} hosts file missing at {}",
            style::CROSS,
            paths.hosts_file.display()
        );
    }

    let missing: Vec<&str> = TEMPLATE_NAMES
        .iter()
        .copied()
        .filter(|name| !paths.templates.join(name).exists())
        .collect();
    if missing.is_empty() {
        println!(
            "{} templates present in {}",
            style::CHECK,
            paths.templates.display()
        );
    } else {
        println!(
            "{} missing templates in {}: {}",
            style::WARN,
            paths.templates.display(),
            missing.join(", ")
        );
    }

    if critical {
        anyhow::bail!("host is not ready for privileged provisioning");
    }
    println!("{} host is ready", style::CHECK);
    Ok(())
}
