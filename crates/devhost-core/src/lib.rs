//! Core provisioning pipeline for local web-development environments:
//! layered configuration, validation, certificate issuance, hosts-file
//! registration, template rendering, and the virtual-host orchestrator.

pub mod cert;
pub mod config;
pub mod error;
pub mod hosts;
pub mod server;
pub mod service;
pub mod template;
pub mod validate;
pub mod vhost;

pub use cert::CertStore;
pub use config::{ConfigStore, SystemPaths};
pub use error::ProvisionError;
pub use hosts::HostsFile;
pub use server::ServerKind;
pub use vhost::{ProvisionReceipt, RemovalReport, VhostManager, VhostRequest};
