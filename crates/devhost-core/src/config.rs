//! Layered configuration store.
//!
//! Two JSON trees, the packaged defaults and the per-user override file, are
//! deep-merged with user values winning at every matching key. The merged
//! view lives in memory; `set` mutates it without touching disk until an
//! explicit `save`.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Packaged default configuration, embedded at build time.
const DEFAULT_CONFIG: &str = include_str!("../assets/default_config.json");

#[derive(Debug, Clone)]
pub struct ConfigStore {
    /// On-disk default tree for file-backed stores; `None` means the embedded
    /// packaged defaults.
    default_path: Option<PathBuf>,
    user_path: PathBuf,
    merged: Value,
}

impl ConfigStore {
    /// Open the store with the packaged defaults and the standard per-user
    /// config path.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's home directory cannot be determined.
    pub fn open() -> Result<Self> {
        let user_path = user_config_path()?;
        Ok(Self::with_user_path(user_path))
    }

    /// Open the store with the packaged defaults and an explicit user config
    /// path.
    #[must_use]
    pub fn with_user_path(user_path: PathBuf) -> Self {
        let mut store = Self {
            default_path: None,
            user_path,
            merged: Value::Object(Map::new()),
        };
        store.reload();
        store
    }

    /// Open the store with both trees read from disk. Missing or corrupt
    /// files are tolerated and treated as empty trees.
    #[must_use]
    pub fn from_files(default_path: PathBuf, user_path: PathBuf) -> Self {
        let mut store = Self {
            default_path: Some(default_path),
            user_path,
            merged: Value::Object(Map::new()),
        };
        store.reload();
        store
    }

    /// Rebuild the merged view from disk.
    fn reload(&mut self) {
        let mut merged = match &self.default_path {
            Some(path) => load_tree(path),
            None => parse_tree(DEFAULT_CONFIG, Path::new("<packaged defaults>")),
        };
        let user = load_tree(&self.user_path);
        deep_merge(&mut merged, &user);
        self.merged = merged;
    }

    /// Look up a value by dotted key.
    ///
    /// Returns `None` the moment a segment is absent or an intermediate value
    /// is not an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut current = &self.merged;
        for segment in key.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// String lookup with a caller-supplied default.
    #[must_use]
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Set a value by dotted key, creating intermediate objects as needed.
    /// Non-object intermediates are replaced by objects.
    ///
    /// Only the in-memory merged view changes; call [`ConfigStore::save`] for
    /// durability.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let segments: Vec<&str> = key.split('.').collect();
        set_path(&mut self.merged, &segments, value.into());
    }

    /// Persist the configuration to the user config file.
    ///
    /// The *entire* merged tree is serialized, defaults included; after the
    /// first save the user file carries a full snapshot and later changes to
    /// packaged defaults no longer show through. That collapse is intended.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.user_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&self.merged)?;
        std::fs::write(&self.user_path, body)
            .with_context(|| format!("failed to write {}", self.user_path.display()))?;
        Ok(())
    }

    /// Delete the user override file and rebuild the merged view from the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the user file exists but cannot be removed.
    pub fn reset(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.user_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to remove {}", self.user_path.display()));
            }
        }
        self.reload();
        Ok(())
    }

    // ---- typed accessors -------------------------------------------------

    /// Projects root directory, with `~` expanded.
    #[must_use]
    pub fn projects_root(&self) -> PathBuf {
        expand_home(&self.get_str("settings.projects_root", "~/projects"))
    }

    pub fn set_projects_root(&mut self, path: &str) {
        self.set("settings.projects_root", path);
    }

    #[must_use]
    pub fn default_web_server(&self) -> String {
        self.get_str("settings.default_web_server", "apache2")
    }

    pub fn set_default_web_server(&mut self, server: &str) {
        self.set("settings.default_web_server", server);
    }

    #[must_use]
    pub fn default_php_version(&self) -> String {
        self.get_str("settings.default_php_version", "8.2")
    }

    pub fn set_default_php_version(&mut self, version: &str) {
        self.set("settings.default_php_version", version);
    }

    /// Suffix appended to sanitized project names to form local domains.
    #[must_use]
    pub fn domain_suffix(&self) -> String {
        self.get_str("settings.default_domain_extension", ".test")
    }

    #[must_use]
    pub fn auto_start_services(&self) -> Vec<String> {
        self.get("settings.auto_start_services")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn add_auto_start_service(&mut self, service: &str) {
        let mut services = self.auto_start_services();
        if !services.iter().any(|s| s == service) {
            services.push(service.to_string());
            self.set("settings.auto_start_services", services);
        }
    }

    pub fn remove_auto_start_service(&mut self, service: &str) {
        let mut services = self.auto_start_services();
        if let Some(idx) = services.iter().position(|s| s == service) {
            services.remove(idx);
            self.set("settings.auto_start_services", services);
        }
    }

    /// Named filesystem path from the `paths` table.
    #[must_use]
    pub fn path(&self, key: &str) -> Option<PathBuf> {
        self.get(&format!("paths.{key}"))
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }

    #[must_use]
    pub fn theme(&self) -> String {
        self.get_str("settings.theme", "light")
    }

    /// Set the theme preference. Unlike the other setters this persists
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails.
    pub fn set_theme(&mut self, theme: &str) -> Result<()> {
        self.set("settings.theme", theme);
        self.save()
    }
}

fn set_path(tree: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if !tree.is_object() {
        *tree = Value::Object(Map::new());
    }
    if let Value::Object(map) = tree {
        if rest.is_empty() {
            map.insert((*head).to_string(), value);
        } else {
            let child = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value);
        }
    }
}

/// Deep-merge `overlay` into `base`: recursive on nested objects, replacement
/// everywhere else.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn load_tree(path: &Path) -> Value {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_tree(&content, path),
        Err(_) => Value::Object(Map::new()),
    }
}

fn parse_tree(content: &str, origin: &Path) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) | Err(_) => {
            warn!("ignoring non-object or corrupt config at {}", origin.display());
            Value::Object(Map::new())
        }
    }
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    } else if path == "~" {
        if let Some(dirs) = directories::UserDirs::new() {
            return dirs.home_dir().to_path_buf();
        }
    }
    PathBuf::from(path)
}

fn user_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("dev", "devhost", "devhost")
        .context("could not determine home directory")?;
    Ok(dirs.config_dir().join("config.json"))
}

/// System path layout used by the provisioning pipeline, resolved from the
/// `paths` table once at startup.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    pub apache_sites: PathBuf,
    pub nginx_sites: PathBuf,
    pub nginx_enabled: PathBuf,
    pub hosts_file: PathBuf,
    pub ssl_certs: PathBuf,
    pub ssl_private: PathBuf,
    pub ca_certificates: PathBuf,
    pub templates: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            apache_sites: PathBuf::from("/etc/apache2/sites-available"),
            nginx_sites: PathBuf::from("/etc/nginx/sites-available"),
            nginx_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
            hosts_file: PathBuf::from("/etc/hosts"),
            ssl_certs: PathBuf::from("/etc/ssl/certs"),
            ssl_private: PathBuf::from("/etc/ssl/private"),
            ca_certificates: PathBuf::from("/usr/local/share/ca-certificates"),
            templates: PathBuf::from("/usr/share/devhost/templates"),
        }
    }
}

impl SystemPaths {
    #[must_use]
    pub fn from_config(config: &ConfigStore) -> Self {
        let defaults = Self::default();
        Self {
            apache_sites: config.path("apache_sites").unwrap_or(defaults.apache_sites),
            nginx_sites: config.path("nginx_sites").unwrap_or(defaults.nginx_sites),
            nginx_enabled: config.path("nginx_enabled").unwrap_or(defaults.nginx_enabled),
            hosts_file: config.path("hosts_file").unwrap_or(defaults.hosts_file),
            ssl_certs: config.path("ssl_certs").unwrap_or(defaults.ssl_certs),
            ssl_private: config.path("ssl_private").unwrap_or(defaults.ssl_private),
            ca_certificates: config
                .path("ca_certificates")
                .unwrap_or(defaults.ca_certificates),
            templates: config.path("templates").unwrap_or(defaults.templates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::with_user_path(dir.path().join("config.json"))
    }

    #[test]
    fn packaged_defaults_are_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert_eq!(store.default_web_server(), "apache2");
        assert_eq!(store.domain_suffix(), ".test");
        assert_eq!(store.path("hosts_file"), Some(PathBuf::from("/etc/hosts")));
    }

    #[test]
    fn get_and_set_roundtrip_dotted_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);

        store.set("settings.default_php_version", "8.3");
        assert_eq!(store.default_php_version(), "8.3");

        store.set("a.b.c", 42);
        assert_eq!(store.get("a.b.c"), Some(&json!(42)));
        assert_eq!(store.get("a.b.missing"), None);
        // Intermediate non-object short-circuits.
        assert_eq!(store.get("a.b.c.d"), None);
    }

    #[test]
    fn user_file_overrides_defaults_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("default.json");
        let user_path = dir.path().join("user.json");

        std::fs::write(
            &default_path,
            r#"{"settings": {"theme": "light", "default_php_version": "8.2"}}"#,
        )
        .expect("write defaults");
        std::fs::write(&user_path, r#"{"settings": {"theme": "dark"}}"#).expect("write user");

        let store = ConfigStore::from_files(default_path, user_path);
        assert_eq!(store.theme(), "dark");
        assert_eq!(store.default_php_version(), "8.2");
    }

    #[test]
    fn corrupt_files_degrade_to_empty_trees() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("default.json");
        let user_path = dir.path().join("user.json");
        std::fs::write(&default_path, "{not json").expect("write");
        std::fs::write(&user_path, "[1, 2, 3]").expect("write");

        let store = ConfigStore::from_files(default_path, user_path);
        assert_eq!(store.get("anything"), None);
        // Hard-coded accessor defaults still apply.
        assert_eq!(store.default_web_server(), "apache2");
    }

    #[test]
    fn save_persists_merged_tree_and_set_alone_does_not() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user_path = dir.path().join("config.json");

        let mut store = ConfigStore::with_user_path(user_path.clone());
        store.set("settings.theme", "dark");
        assert!(!user_path.exists());

        store.save().expect("save");
        let persisted: Value =
            serde_json::from_str(&std::fs::read_to_string(&user_path).expect("read"))
                .expect("parse");
        assert_eq!(persisted["settings"]["theme"], json!("dark"));
        // Defaults are persisted along with the override.
        assert_eq!(persisted["settings"]["default_web_server"], json!("apache2"));
    }

    #[test]
    fn reset_deletes_user_file_and_restores_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user_path = dir.path().join("config.json");

        let mut store = ConfigStore::with_user_path(user_path.clone());
        store.set("settings.theme", "dark");
        store.save().expect("save");
        assert!(user_path.exists());

        store.reset().expect("reset");
        assert!(!user_path.exists());
        assert_eq!(store.theme(), "light");

        // Resetting again (no user file) is fine.
        store.reset().expect("reset again");
    }

    #[test]
    fn auto_start_services_have_set_semantics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);

        store.add_auto_start_service("nginx");
        store.add_auto_start_service("mysql");
        store.add_auto_start_service("nginx");
        assert_eq!(store.auto_start_services(), vec!["nginx", "mysql"]);

        store.remove_auto_start_service("nginx");
        assert_eq!(store.auto_start_services(), vec!["mysql"]);
        store.remove_auto_start_service("absent");
        assert_eq!(store.auto_start_services(), vec!["mysql"]);
    }

    #[test]
    fn projects_root_expands_home() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let root = store.projects_root();
        assert!(!root.to_string_lossy().contains('~'));
        assert!(root.ends_with("projects"));
    }

    // ---- deep-merge property tests --------------------------------------

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(|m| {
                Value::Object(m.into_iter().collect())
            })
        })
    }

    /// Walk `overlay`; at every leaf, the merged tree must hold overlay's
    /// value.
    fn assert_overlay_wins(merged: &Value, overlay: &Value) {
        match overlay {
            Value::Object(map) => {
                let merged_map = merged.as_object().expect("merged object where overlay is");
                for (key, value) in map {
                    assert_overlay_wins(&merged_map[key], value);
                }
            }
            leaf => assert_eq!(merged, leaf),
        }
    }

    /// Walk `base`; keys absent from overlay keep base's value.
    fn assert_base_preserved(merged: &Value, base: &Value, overlay: &Value) {
        let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
            return;
        };
        let merged_map = merged.as_object().expect("merged object where base is");
        for (key, base_value) in base_map {
            match overlay_map.get(key) {
                None => assert_eq!(&merged_map[key], base_value),
                Some(overlay_value) if base_value.is_object() && overlay_value.is_object() => {
                    assert_base_preserved(&merged_map[key], base_value, overlay_value);
                }
                Some(_) => {}
            }
        }
    }

    proptest! {
        #[test]
        fn deep_merge_overlay_wins_and_base_survives(
            base in arb_json(),
            overlay in arb_json(),
        ) {
            let mut merged = base.clone();
            deep_merge(&mut merged, &overlay);
            assert_overlay_wins(&merged, &overlay);
            assert_base_preserved(&merged, &base, &overlay);
        }

        #[test]
        fn deep_merge_with_empty_overlay_is_identity(base in arb_json()) {
            let mut merged = base.clone();
            deep_merge(&mut merged, &Value::Object(Map::new()));
            // Merging an empty object only applies to object bases; otherwise
            // it replaces. Both cases are covered by the contract.
            if base.is_object() {
                prop_assert_eq!(merged, base);
            }
        }
    }
}
