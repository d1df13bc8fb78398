//! GitHub REST and raw-content client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::locator::{morph_file_name, GithubRef, RemoteRef};

use super::{
    check_http_response, validate_gist_file_name, FetchedNotebook, RemoteError, RemoteHost,
    GIST_DESCRIPTION,
};

const USER_AGENT: &str = concat!("nbfiddle/", env!("CARGO_PKG_VERSION"));
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Base URLs of the GitHub services the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubEndpoints {
    /// REST API base, e.g. `https://api.github.com`.
    pub api_base: String,
    /// Raw file content base, e.g. `https://raw.githubusercontent.com`.
    pub raw_base: String,
    /// Gist web base used to build gist URIs, e.g. `https://gist.github.com`.
    pub gist_web_base: String,
}

impl Default for GithubEndpoints {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_owned(),
            raw_base: "https://raw.githubusercontent.com".to_owned(),
            gist_web_base: "https://gist.github.com".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireGist {
    id: String,
    #[serde(default)]
    files: BTreeMap<String, WireGistFile>,
    owner: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireGistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    login: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`RemoteHost`] over the GitHub API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    endpoints: GithubEndpoints,
}

impl GithubClient {
    /// Build a client with the given endpoints and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoints: GithubEndpoints, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, endpoints })
    }

    /// The configured endpoints.
    pub fn endpoints(&self) -> &GithubEndpoints {
        &self.endpoints
    }

    /// Raw content URL of a repository file.
    pub fn raw_url(&self, github: &GithubRef) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.endpoints.raw_base.trim_end_matches('/'),
            github.owner,
            github.repo,
            github.branch,
            github.path
        )
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoints.api_base.trim_end_matches('/'))
    }

    fn api_get(&self, path: &str) -> RequestBuilder {
        self.with_api_headers(self.http.get(self.api_url(path)))
    }

    fn with_api_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    async fn fetch_gist(&self, gist_id: &str) -> Result<WireGist, RemoteError> {
        let response = self.api_get(&format!("/gists/{gist_id}")).send().await?;
        let body = check_http_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_github(&self, github: &GithubRef) -> Result<FetchedNotebook, RemoteError> {
        let url = self.raw_url(github);
        debug!(url = %url, "fetching github notebook");
        let response = self.http.get(&url).send().await?;
        let content = check_http_response(response).await?;
        Ok(FetchedNotebook {
            content,
            file_path: github.path.clone(),
        })
    }

    async fn fetch_gist_file(
        &self,
        gist_id: &str,
        file_morphed: &str,
    ) -> Result<FetchedNotebook, RemoteError> {
        let gist = self.fetch_gist(gist_id).await?;
        let (file_name, file) = gist
            .files
            .into_iter()
            .find(|(name, _)| morph_file_name(name).eq_ignore_ascii_case(file_morphed))
            .ok_or_else(|| RemoteError::GistFileNotFound {
                gist_id: gist_id.to_owned(),
                file: file_morphed.to_owned(),
            })?;

        let content = match (file.content, file.truncated, file.raw_url) {
            (Some(content), false, _) => content,
            (_, _, Some(raw_url)) => {
                debug!(file = %file_name, "gist file truncated, fetching raw content");
                let response = self.http.get(&raw_url).send().await?;
                check_http_response(response).await?
            }
            (_, _, None) => {
                return Err(RemoteError::InvalidResponse(format!(
                    "gist file {file_name} has no content"
                )))
            }
        };
        Ok(FetchedNotebook {
            content,
            file_path: file_name,
        })
    }
}

#[async_trait]
impl RemoteHost for GithubClient {
    async fn fetch(&self, remote: &RemoteRef) -> Result<FetchedNotebook, RemoteError> {
        match remote {
            RemoteRef::Github(github) => self.fetch_github(github).await,
            RemoteRef::Gist(gist) => self.fetch_gist_file(&gist.gist_id, &gist.file_morphed).await,
        }
    }

    async fn authenticated_user(&self, token: &str) -> Result<String, RemoteError> {
        let response = self.api_get("/user").bearer_auth(token).send().await?;
        let body = check_http_response(response).await?;
        let user: WireUser = serde_json::from_str(&body)?;
        Ok(user.login)
    }

    async fn gist_owner(&self, gist_id: &str) -> Result<String, RemoteError> {
        let gist = self.fetch_gist(gist_id).await?;
        gist.owner
            .map(|owner| owner.login)
            .ok_or_else(|| RemoteError::InvalidResponse(format!("gist {gist_id} has no owner")))
    }

    async fn create_gist(
        &self,
        token: &str,
        file_name: &str,
        content: &str,
    ) -> Result<String, RemoteError> {
        validate_gist_file_name(file_name)?;
        let payload = json!({
            "description": GIST_DESCRIPTION,
            "public": false,
            "files": { file_name: { "content": content } },
        });
        let request = self
            .with_api_headers(self.http.post(self.api_url("/gists")))
            .bearer_auth(token)
            .json(&payload);
        let body = check_http_response(request.send().await?).await?;
        let gist: WireGist = serde_json::from_str(&body)?;
        let owner = gist
            .owner
            .map(|owner| owner.login)
            .ok_or_else(|| RemoteError::InvalidResponse("created gist has no owner".to_owned()))?;

        let gist_uri = format!(
            "{}/{owner}/{}",
            self.endpoints.gist_web_base.trim_end_matches('/'),
            gist.id
        );
        info!(gist_uri = %gist_uri, file = file_name, "gist created");
        Ok(gist_uri)
    }

    async fn update_gist(
        &self,
        token: &str,
        gist_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<(), RemoteError> {
        let payload = json!({ "files": { file_name: { "content": content } } });
        let request = self
            .with_api_headers(self.http.patch(self.api_url(&format!("/gists/{gist_id}"))))
            .bearer_auth(token)
            .json(&payload);
        check_http_response(request.send().await?).await?;
        info!(gist_id, file = file_name, "gist updated");
        Ok(())
    }
}
