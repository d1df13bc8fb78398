//! Remote notebook hosts: GitHub repositories and Gists.
//!
//! [`RemoteHost`] is the seam between sessions and the network. The
//! production implementation is [`GithubClient`]; tests substitute their own.

pub mod github;
pub mod http;

use async_trait::async_trait;
use tracing::warn;

use crate::locator::{GistRef, RemoteRef};

pub use self::github::{GithubClient, GithubEndpoints};
pub use self::http::check_http_response;

/// Description attached to gists created from the tool.
pub const GIST_DESCRIPTION: &str = "Notebook saved from nbfiddle";

/// Errors from remote hosts.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// HTTP transport failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Host responded with a non-success status.
    #[error("remote returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Redacted, truncated response body.
        body: String,
    },

    /// The gist has no file matching the URL fragment.
    #[error("gist {gist_id} has no file matching {file}")]
    GistFileNotFound {
        /// Gist id.
        gist_id: String,
        /// Morphed file name from the URL.
        file: String,
    },

    /// Response JSON lacked a required field.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// Response body was not valid JSON.
    #[error("invalid response json: {0}")]
    Json(#[from] serde_json::Error),

    /// Gist file names must end in `.ipynb`.
    #[error("gist file name must end with .ipynb: {0}")]
    InvalidFileName(String),

    /// The authenticated user does not own the gist.
    #[error("user {user} is not the owner of this gist (owned by {owner})")]
    NotOwner {
        /// Authenticated login.
        user: String,
        /// Gist owner login.
        owner: String,
    },
}

/// A notebook file fetched from a remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedNotebook {
    /// Raw ipynb JSON.
    pub content: String,
    /// Path of the file (repository path or gist file name).
    pub file_path: String,
}

/// A host serving and accepting notebooks.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Fetch the notebook a remote reference points at.
    async fn fetch(&self, remote: &RemoteRef) -> Result<FetchedNotebook, RemoteError>;

    /// Login of the user owning `token`.
    async fn authenticated_user(&self, token: &str) -> Result<String, RemoteError>;

    /// Login of the gist's owner.
    async fn gist_owner(&self, gist_id: &str) -> Result<String, RemoteError>;

    /// Create a secret gist holding one file. Returns the gist URI
    /// (`<gist web base>/<owner>/<id>`).
    async fn create_gist(
        &self,
        token: &str,
        file_name: &str,
        content: &str,
    ) -> Result<String, RemoteError>;

    /// Replace one file of an existing gist.
    async fn update_gist(
        &self,
        token: &str,
        gist_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<(), RemoteError>;
}

/// Check that the user owning `token` owns `gist`. Returns the login.
///
/// # Errors
///
/// Returns [`RemoteError::NotOwner`] on mismatch (logins compare
/// case-insensitively), or the host's error if either lookup fails.
pub async fn verify_gist_owner(
    host: &dyn RemoteHost,
    token: &str,
    gist: &GistRef,
) -> Result<String, RemoteError> {
    let user = host.authenticated_user(token).await?;
    let owner = host.gist_owner(&gist.gist_id).await?;
    if !user.eq_ignore_ascii_case(&owner) {
        warn!(user = %user, owner = %owner, gist_id = %gist.gist_id, "gist write-back refused");
        return Err(RemoteError::NotOwner { user, owner });
    }
    Ok(user)
}

/// Validate the name of a file about to be saved into a new gist.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidFileName`] unless the name ends in `.ipynb`
/// and has a stem.
pub fn validate_gist_file_name(file_name: &str) -> Result<(), RemoteError> {
    match file_name.strip_suffix(".ipynb") {
        Some(stem) if !stem.trim().is_empty() && !file_name.contains('/') => Ok(()),
        _ => Err(RemoteError::InvalidFileName(file_name.to_owned())),
    }
}
