//! Input validation and sanitization.
//!
//! Pure functions, no I/O. Every value that later reaches a subprocess
//! argument or a template placeholder passes through here first.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$",
    )
    .expect("domain regex")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("name regex"));

/// Validate a domain name against a conservative DNS label grammar.
///
/// `localhost` is accepted verbatim; otherwise labels are 1-63
/// alphanumerics/hyphens, not starting or ending with a hyphen, and the whole
/// name is at most 253 characters.
#[must_use]
pub fn validate_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    if domain == "localhost" {
        return true;
    }
    DOMAIN_RE.is_match(domain)
}

/// Normalize arbitrary input into something domain-shaped: lowercase, strip
/// everything outside `[a-z0-9.-]`, trim leading/trailing dots and hyphens.
#[must_use]
pub fn sanitize_domain(domain: &str) -> String {
    let filtered: String = domain
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    filtered.trim_matches(|c| c == '.' || c == '-').to_string()
}

#[must_use]
pub fn validate_database_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 64 && NAME_RE.is_match(name)
}

#[must_use]
pub fn validate_username(username: &str) -> bool {
    !username.is_empty() && username.len() <= 32 && NAME_RE.is_match(username)
}

/// Validate a filesystem path: non-empty and free of NUL/CR/LF. With
/// `must_exist`, the path must also be present on disk.
#[must_use]
pub fn validate_path(path: &str, must_exist: bool) -> bool {
    if path.is_empty() || path.contains(['\0', '\n', '\r']) {
        return false;
    }
    if must_exist {
        return Path::new(path).exists();
    }
    true
}

/// Strip filesystem-hostile characters and trim leading/trailing dots and
/// spaces.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let filtered: String = filename
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\0'))
        .collect();
    filtered.trim_matches(|c| c == '.' || c == ' ').to_string()
}
