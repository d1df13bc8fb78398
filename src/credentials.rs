//! Credential loading from the runtime `.env` file and the environment.
//!
//! The only credential nbfiddle uses is a GitHub personal access token with
//! the `gist` scope. It is read from `$NBFIDDLE_GITHUB_TOKEN` first and from
//! `<root>/.env` otherwise. The `.env` file must not be readable by group or
//! others.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::config::runtime_paths;

/// Key of the GitHub token in the environment and in `.env`.
pub const GITHUB_TOKEN_KEY: &str = "NBFIDDLE_GITHUB_TOKEN";

/// Credentials loaded from the `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns all non-empty credential values for redaction purposes.
    pub fn known_secrets(&self) -> Vec<String> {
        self.vars
            .values()
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// A GitHub personal access token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct GithubToken(String);

impl std::fmt::Debug for GithubToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GithubToken").field(&"[REDACTED]").finish()
    }
}

impl GithubToken {
    /// Wrap a token value. Returns `None` for blank input.
    pub fn new(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    /// The raw token, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Resolve the GitHub token: the environment wins over `.env`.
pub fn resolve_github_token(
    credentials: &Credentials,
    env: impl Fn(&str) -> Option<String>,
) -> Option<GithubToken> {
    if let Some(token) = env(GITHUB_TOKEN_KEY).as_deref().and_then(GithubToken::new) {
        debug!("using GitHub token from environment");
        return Some(token);
    }
    let token = credentials.get(GITHUB_TOKEN_KEY).and_then(GithubToken::new);
    if token.is_some() {
        debug!("using GitHub token from .env");
    }
    token
}

/// Load credentials from a specific `.env` path.
///
/// # Errors
///
/// Returns an error if the file does not exist, permissions are too broad,
/// or parsing fails.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "credentials file does not exist: {}",
            path.display()
        ));
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials { vars })
}

/// Load credentials from `<root>/.env`, or none when the file is absent.
///
/// # Errors
///
/// Returns an error when runtime paths cannot be resolved or an existing
/// credentials file is invalid.
pub fn load_default_credentials() -> anyhow::Result<Credentials> {
    let paths = runtime_paths()?;
    if !paths.env_file.exists() {
        return Ok(Credentials::default());
    }
    load_credentials(&paths.env_file)
}

/// Set one key in a `.env` file, keeping the others, with 0600 permissions.
///
/// # Errors
///
/// Returns an error if the existing file is invalid or cannot be rewritten.
pub fn store_credential(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut vars = if path.exists() {
        load_credentials(path)?.vars
    } else {
        BTreeMap::new()
    };
    vars.insert(key.to_owned(), value.to_owned());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("failed to write credentials at {}", path.display()))?;
    enforce_private_file_permissions(path)?;
    for (k, v) in &vars {
        writeln!(file, "{k}={v}")
            .with_context(|| format!("failed to write credentials at {}", path.display()))?;
    }
    Ok(())
}

/// Restrict a file to owner read/write when supported.
///
/// # Errors
///
/// Returns an error if permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
