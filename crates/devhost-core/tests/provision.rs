//! End-to-end provisioning scenarios against a temp-directory system layout.
//!
//! A scripted [`CommandRunner`] stands in for the privilege bridge: it
//! reports itself as already elevated (so file I/O hits the temp layout
//! directly), actually performs `ln` so enabled-site symlinks are real, and
//! scripts everything that would need a live system (`systemctl`, `nginx -t`,
//! `a2ensite`, ...).

use async_trait::async_trait;
use devhost_core::config::SystemPaths;
use devhost_core::error::ProvisionError;
use devhost_core::server::ServerKind;
use devhost_core::vhost::{StepOutcome, VhostManager, VhostRequest};
use devhost_utils::{CommandOutput, CommandRunner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn ok() -> CommandOutput {
    CommandOutput {
        code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[derive(Debug, Default)]
struct ScriptedRunner {
    commands: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, (i32, String)>>,
}

impl ScriptedRunner {
    fn fail(&self, program: &str, code: i32, stderr: &str) {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(program.to_string(), (code, stderr.to_string()));
    }

    fn recorded(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }

    fn dispatch(&self, program: &str, args: &[&str]) -> CommandOutput {
        self.commands
            .lock()
            .expect("commands lock")
            .push(format!("{program} {}", args.join(" ")).trim().to_string());

        if let Some((code, stderr)) = self.failures.lock().expect("failures lock").get(program) {
            return CommandOutput {
                code: *code,
                stdout: String::new(),
                stderr: stderr.clone(),
            };
        }

        match program {
            // Enabled-site symlinks are created for real so the on-disk
            // layout matches what nginx would see.
            "ln" if args.len() == 3 && args[0] == "-sf" => {
                let _ = std::fs::remove_file(args[2]);
                std::os::unix::fs::symlink(args[1], args[2]).expect("symlink");
                ok()
            }
            "rm" if args.len() == 2 && args[0] == "-f" => {
                let _ = std::fs::remove_file(args[1]);
                ok()
            }
            "cp" if args.len() == 2 => {
                std::fs::copy(args[0], args[1]).expect("copy");
                ok()
            }
            _ => ok(),
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        self.dispatch(program, args)
    }

    async fn run_privileged(&self, program: &str, args: &[&str]) -> CommandOutput {
        self.dispatch(program, args)
    }

    fn already_elevated(&self) -> bool {
        true
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    runner: Arc<ScriptedRunner>,
    manager: VhostManager,
    paths: SystemPaths,
    docroot: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();

    let templates = root.join("templates");
    std::fs::create_dir_all(&templates).expect("templates dir");
    for (name, body) in [
        (
            "apache_vhost.conf",
            include_str!("../../../templates/apache_vhost.conf"),
        ),
        (
            "apache_ssl.conf",
            include_str!("../../../templates/apache_ssl.conf"),
        ),
        (
            "nginx_vhost.conf",
            include_str!("../../../templates/nginx_vhost.conf"),
        ),
        (
            "nginx_ssl.conf",
            include_str!("../../../templates/nginx_ssl.conf"),
        ),
    ] {
        std::fs::write(templates.join(name), body).expect("write template");
    }

    let paths = SystemPaths {
        apache_sites: root.join("apache2/sites-available"),
        nginx_sites: root.join("nginx/sites-available"),
        nginx_enabled: root.join("nginx/sites-enabled"),
        hosts_file: root.join("hosts"),
        ssl_certs: root.join("ssl/certs"),
        ssl_private: root.join("ssl/private"),
        ca_certificates: root.join("ca-certificates"),
        templates,
    };
    for p in [
        &paths.apache_sites,
        &paths.nginx_sites,
        &paths.nginx_enabled,
        &paths.ssl_certs,
        &paths.ssl_private,
        &paths.ca_certificates,
    ] {
        std::fs::create_dir_all(p).expect("layout dir");
    }
    std::fs::write(&paths.hosts_file, "127.0.0.1 localhost\n").expect("hosts");

    let docroot = root.join("www/shop");
    std::fs::create_dir_all(&docroot).expect("docroot");

    let runner = Arc::new(ScriptedRunner::default());
    let manager = VhostManager::new(runner.clone(), paths.clone(), ".test".to_string());

    Fixture {
        _dir: dir,
        runner,
        manager,
        paths,
        docroot,
    }
}

fn request(fx: &Fixture, server: ServerKind, ssl: bool) -> VhostRequest {
    VhostRequest {
        project_name: "shop".to_string(),
        document_root: fx.docroot.clone(),
        server,
        php_version: "8.2".to_string(),
        enable_ssl: ssl,
        custom_domain: None,
    }
}

fn hosts_content(fx: &Fixture) -> String {
    std::fs::read_to_string(&fx.paths.hosts_file).expect("read hosts")
}

#[tokio::test]
async fn creates_nginx_vhost_with_all_artifacts() {
    let fx = fixture();

    let receipt = fx
        .manager
        .create(&request(&fx, ServerKind::Nginx, false))
        .await
        .expect("create");
    assert_eq!(receipt.domain, "shop.test");

    let site = fx.paths.nginx_sites.join("shop.test");
    let config = std::fs::read_to_string(&site).expect("site file");
    assert!(config.contains(&fx.docroot.to_string_lossy().to_string()));
    assert!(config.contains("server_name shop.test www.shop.test;"));
    // No SSL requested: the placeholder collapsed to nothing.
    assert!(!config.contains("ssl_certificate"));
    assert!(!config.contains("{ssl_config}"));

    let symlink = fx.paths.nginx_enabled.join("shop.test");
    assert!(symlink.symlink_metadata().is_ok(), "enabled symlink present");

    assert!(hosts_content(&fx).contains("127.0.0.1 shop.test"));

    let commands = fx.runner.recorded();
    let test_idx = commands.iter().position(|c| c == "nginx -t").expect("nginx -t ran");
    let reload_idx = commands
        .iter()
        .position(|c| c == "systemctl reload nginx")
        .expect("reload ran");
    assert!(test_idx < reload_idx, "config tested before reload");
}

#[tokio::test]
async fn hosts_registration_is_idempotent_across_creates() {
    let fx = fixture();
    let req = request(&fx, ServerKind::Nginx, false);

    fx.manager.create(&req).await.expect("first create");
    fx.manager.create(&req).await.expect("second create");

    let matching = hosts_content(&fx)
        .lines()
        .filter(|l| *l == "127.0.0.1 shop.test")
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn ssl_vhost_issues_certificate_before_config_references_it() {
    let fx = fixture();

    fx.manager
        .create(&request(&fx, ServerKind::Nginx, true))
        .await
        .expect("create with ssl");

    let cert_path = fx.paths.ssl_certs.join("shop.test.crt");
    let key_path = fx.paths.ssl_private.join("shop.test.key");
    assert!(cert_path.exists(), "certificate written");
    assert!(key_path.exists(), "key written");
    assert!(
        std::fs::read_to_string(&cert_path)
            .expect("read cert")
            .starts_with("-----BEGIN CERTIFICATE-----")
    );

    let config =
        std::fs::read_to_string(fx.paths.nginx_sites.join("shop.test")).expect("site file");
    assert!(config.contains(&cert_path.to_string_lossy().to_string()));
    assert!(config.contains(&key_path.to_string_lossy().to_string()));
    assert!(config.contains("listen 443 ssl;"));
}

#[tokio::test]
async fn missing_docroot_fails_without_touching_anything() {
    let fx = fixture();
    let mut req = request(&fx, ServerKind::Nginx, false);
    req.document_root = fx.docroot.join("missing");

    let err = fx.manager.create(&req).await.expect_err("must fail");
    assert!(matches!(err, ProvisionError::DocRootMissing { .. }));

    let sites: Vec<_> = std::fs::read_dir(&fx.paths.nginx_sites)
        .expect("read dir")
        .collect();
    assert!(sites.is_empty(), "no config written");
    assert_eq!(hosts_content(&fx), "127.0.0.1 localhost\n");
    assert!(fx.runner.recorded().is_empty(), "no commands executed");
}

#[tokio::test]
async fn removing_a_vhost_that_never_existed_succeeds_with_noops() {
    let fx = fixture();

    let report = fx.manager.remove("ghost.test", ServerKind::Nginx).await;
    assert!(report.clean());
    assert!(!report.changed());
    assert!(
        report
            .steps
            .iter()
            .all(|s| s.outcome == StepOutcome::Skipped)
    );
}

#[tokio::test]
async fn failed_nginx_syntax_check_rolls_back_all_artifacts() {
    let fx = fixture();
    fx.runner
        .fail("nginx", 1, "nginx: [emerg] invalid directive");

    let err = fx
        .manager
        .create(&request(&fx, ServerKind::Nginx, false))
        .await
        .expect_err("syntax check fails");
    assert!(matches!(err, ProvisionError::ConfigInvalid { .. }));

    assert!(!fx.paths.nginx_sites.join("shop.test").exists());
    assert!(
        fx.paths
            .nginx_enabled
            .join("shop.test")
            .symlink_metadata()
            .is_err(),
        "symlink rolled back"
    );
    assert!(!hosts_content(&fx).contains("shop.test"));
}

#[tokio::test]
async fn failed_reload_reports_partial_and_keeps_artifacts() {
    let fx = fixture();
    fx.runner.fail("systemctl", 1, "job failed");

    let err = fx
        .manager
        .create(&request(&fx, ServerKind::Nginx, false))
        .await
        .expect_err("reload fails");
    assert!(matches!(err, ProvisionError::PartialProvisioning { .. }));

    // Documented behavior: installed state stays in place.
    assert!(fx.paths.nginx_sites.join("shop.test").exists());
    assert!(hosts_content(&fx).contains("127.0.0.1 shop.test"));
}

#[tokio::test]
async fn cancelled_elevation_maps_to_distinct_error_and_rolls_back() {
    let fx = fixture();
    fx.runner.fail("a2ensite", 126, "dismissed");

    let err = fx
        .manager
        .create(&request(&fx, ServerKind::Apache, false))
        .await
        .expect_err("prompt dismissed");
    assert!(matches!(err, ProvisionError::AuthenticationCancelled));

    assert!(
        !fx.paths.apache_sites.join("shop.test.conf").exists(),
        "written config rolled back"
    );
    assert!(!hosts_content(&fx).contains("shop.test"));
}

#[tokio::test]
async fn cancelled_module_prompt_disables_the_already_enabled_site() {
    let fx = fixture();
    fx.runner.fail("a2enmod", 126, "dismissed");

    let err = fx
        .manager
        .create(&request(&fx, ServerKind::Apache, false))
        .await
        .expect_err("module prompt dismissed");
    assert!(matches!(err, ProvisionError::AuthenticationCancelled));

    // a2ensite had succeeded, so rollback must disable the registration
    // before deleting the config file.
    let commands = fx.runner.recorded();
    assert!(commands.contains(&"a2ensite shop.test.conf".to_string()));
    assert!(commands.contains(&"a2dissite shop.test.conf".to_string()));
    assert!(!fx.paths.apache_sites.join("shop.test.conf").exists());
    assert!(!hosts_content(&fx).contains("shop.test"));
}

#[tokio::test]
async fn creates_apache_vhost_through_a2_tooling() {
    let fx = fixture();

    let receipt = fx
        .manager
        .create(&request(&fx, ServerKind::Apache, false))
        .await
        .expect("create");
    assert_eq!(receipt.site_path, fx.paths.apache_sites.join("shop.test.conf"));

    let config = std::fs::read_to_string(&receipt.site_path).expect("site file");
    assert!(config.contains("ServerName shop.test"));
    assert!(config.contains("php8.2-fpm.sock"));

    let commands = fx.runner.recorded();
    assert!(commands.contains(&"a2ensite shop.test.conf".to_string()));
    assert!(commands.contains(&"a2enmod rewrite".to_string()));
    assert!(commands.contains(&"systemctl reload apache2".to_string()));
    assert!(hosts_content(&fx).contains("127.0.0.1 shop.test"));
}

#[tokio::test]
async fn create_then_remove_leaves_no_trace() {
    let fx = fixture();

    fx.manager
        .create(&request(&fx, ServerKind::Nginx, false))
        .await
        .expect("create");
    let report = fx.manager.remove("shop.test", ServerKind::Nginx).await;

    assert!(report.clean());
    assert!(report.changed());
    assert!(!fx.paths.nginx_sites.join("shop.test").exists());
    assert!(
        fx.paths
            .nginx_enabled
            .join("shop.test")
            .symlink_metadata()
            .is_err()
    );
    assert!(!hosts_content(&fx).contains("shop.test"));
    assert!(
        fx.runner
            .recorded()
            .contains(&"systemctl reload nginx".to_string())
    );
}

#[tokio::test]
async fn removal_does_not_disturb_sibling_domains() {
    let fx = fixture();

    // A sibling domain whose name contains the removed one as a suffix.
    std::fs::write(
        &fx.paths.hosts_file,
        "127.0.0.1 localhost\n127.0.0.1 myshop.test\n",
    )
    .expect("seed hosts");

    fx.manager
        .create(&request(&fx, ServerKind::Nginx, false))
        .await
        .expect("create");
    fx.manager.remove("shop.test", ServerKind::Nginx).await;

    let hosts = hosts_content(&fx);
    assert!(hosts.contains("127.0.0.1 myshop.test"));
    assert!(!hosts.contains("127.0.0.1 shop.test\n"));
}
