mod cli;
mod doctor;
mod style;

use anyhow::Result;
use clap::Parser;
use cli::{CertCommands, Cli, Commands, ConfigCommands, VhostCommands};
use devhost_core::validate::validate_domain;
use devhost_core::{
    CertStore, ConfigStore, ProvisionError, ServerKind, SystemPaths, VhostManager, VhostRequest,
};
use devhost_utils::Elevator;
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ConfigStore::open()?;
    let elevator = Elevator::new();

    match cli.command {
        Commands::Vhost { command } => {
            elevator.require_escalation_tool()?;
            vhost_command(command, &config, elevator).await
        }
        Commands::Cert { command } => {
            elevator.require_escalation_tool()?;
            cert_command(command, &config, &elevator).await
        }
        Commands::Config { command } => config_command(command, &mut config),
        Commands::Doctor => doctor::run(&config, &elevator).await,
    }
}

async fn vhost_command(
    command: VhostCommands,
    config: &ConfigStore,
    elevator: Elevator,
) -> Result<()> {
    let paths = SystemPaths::from_config(config);
    let manager = VhostManager::new(Arc::new(elevator), paths, config.domain_suffix());

    match command {
        VhostCommands::Create {
            project,
            root,
            server,
            php,
            ssl,
            domain,
        } => {
            let server = ServerKind::parse(&server.unwrap_or_else(|| config.default_web_server()))?;
            let document_root = root.unwrap_or_else(|| config.projects_root().join(&project));
            let request = VhostRequest {
                project_name: project,
                document_root,
                server,
                php_version: php.unwrap_or_else(|| config.default_php_version()),
                enable_ssl: ssl,
                custom_domain: domain,
            };

            let receipt = manager.create(&request).await?;
            let scheme = if receipt.ssl { "https" } else { "http" };
            println!(
                "{} Virtual host created: {scheme}://{}",
                style::CHECK,
                receipt.domain
            );
            println!(
                "{} Configuration: {}",
                style::DOT,
                receipt.site_path.display()
            );
            Ok(())
        }
        VhostCommands::Remove { domain, server } => {
            let server = ServerKind::parse(&server.unwrap_or_else(|| config.default_web_server()))?;
            let report = manager.remove(&domain, server).await;
            for step in &report.steps {
                println!("{} {}: {}", style::DOT, step.action, step.outcome);
            }
            if report.clean() {
                println!("{} Virtual host removed: {}", style::CHECK, report.domain);
            } else {
                println!(
                    "{} Virtual host removed with failed steps: {}",
                    style::WARN,
                    report.domain
                );
            }
            Ok(())
        }
    }
}

async fn cert_command(
    command: CertCommands,
    config: &ConfigStore,
    elevator: &Elevator,
) -> Result<()> {
    let paths = SystemPaths::from_config(config);
    let certs = CertStore::from_paths(&paths);

    match command {
        CertCommands::Issue { domain, days } => {
            if !validate_domain(&domain) {
                return Err(ProvisionError::InvalidDomain { domain }.into());
            }
            certs.issue_self_signed(elevator, &domain, days).await?;
            println!(
                "{} Certificate issued for {domain} ({days} days)",
                style::CHECK
            );
            println!("{} {}", style::DOT, certs.cert_path(&domain).display());
            println!("{} {}", style::DOT, certs.key_path(&domain).display());
            Ok(())
        }
        CertCommands::Install { domain } => {
            certs.install(elevator, &domain).await?;
            println!(
                "{} Certificate for {domain} installed into the trust store",
                style::CHECK
            );
            Ok(())
        }
        CertCommands::Remove { domain } => {
            certs.remove(elevator, &domain).await;
            println!("{} Certificate for {domain} removed", style::CHECK);
            Ok(())
        }
        CertCommands::Status { domain } => {
            if certs.exists(&domain) {
                println!("{} Certificate pair present for {domain}", style::CHECK);
            } else {
                println!("{} No certificate pair for {domain}", style::DOT);
            }
            Ok(())
        }
    }
}

fn config_command(command: ConfigCommands, config: &mut ConfigStore) -> Result<()> {
    match command {
        ConfigCommands::Get { key } => {
            match config.get(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
                None => println!("(unset)"),
            }
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            // Accept JSON literals (numbers, booleans, arrays); anything that
            // does not parse is stored as a plain string.
            let value: Value =
                serde_json::from_str(&value).unwrap_or_else(|_| Value::String(value));
            config.set(&key, value);
            config.save()?;
            println!("{} {key} saved", style::CHECK);
            Ok(())
        }
        ConfigCommands::Reset => {
            config.reset()?;
            println!("{} Configuration reset to defaults", style::CHECK);
            Ok(())
        }
    }
}
