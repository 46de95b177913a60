//! Server configuration templates.
//!
//! Templates are plain text with named `{placeholder}` markers substituted
//! verbatim; there is no conditional logic and no escaping, so every value
//! must be validated/sanitized before it gets here. Brace text that is not a
//! known placeholder (nginx blocks, Apache `${APACHE_LOG_DIR}`) passes
//! through untouched.

use crate::error::ProvisionError;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    pub domain: &'a str,
    pub document_root: &'a str,
    pub php_version: &'a str,
    pub ssl_config: &'a str,
    pub ssl_cert: &'a str,
    pub ssl_key: &'a str,
}

/// Substitute the named placeholders.
#[must_use]
pub fn render(template: &str, vars: &TemplateVars<'_>) -> String {
    template
        .replace("{domain}", vars.domain)
        .replace("{document_root}", vars.document_root)
        .replace("{php_version}", vars.php_version)
        .replace("{ssl_config}", vars.ssl_config)
        .replace("{ssl_cert}", vars.ssl_cert)
        .replace("{ssl_key}", vars.ssl_key)
}

/// Load a template from the templates directory.
///
/// # Errors
///
/// A missing or unreadable template is a hard failure
/// ([`ProvisionError::TemplateLoad`]).
pub async fn load(dir: &Path, name: &str) -> Result<String, ProvisionError> {
    let path = dir.join(name);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ProvisionError::TemplateLoad { path, source })
}
