//! Notebook addressing: query parameters, GitHub/Gist URLs and storage keys.
//!
//! A notebook is addressed either by a `url` query parameter carrying a
//! GitHub blob URL or a Gist URL, or by a `localname` naming a locally stored
//! notebook. With neither, the reserved default local notebook is used.
//!
//! Gist URLs name the file in their fragment (`#file-<name>`). Because `#`
//! would end the outer query, it travels percent-encoded as `%23`; both
//! spellings resolve to the same [`GistRef`].

use std::fmt;

use url::{form_urlencoded, Url};

const GITHUB_PREFIX: &str = "https://github.com/";
const GIST_PREFIX: &str = "https://gist.github.com/";
const GIST_FILE_FRAGMENT: &str = "#file-";

/// Storage key of the default local notebook.
pub const DEFAULT_LOCAL_KEY: &str = "local";

/// Errors from notebook address parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    /// GitHub URL lacks `<owner>/<repo>/blob/<branch>/<path>`.
    #[error("invalid GitHub URL: {0}")]
    InvalidGithubUrl(String),

    /// Gist URL has no `#` fragment naming the file.
    #[error("missing file specifier in Gist URL")]
    MissingGistFile,

    /// Gist URL lacks `<owner>/<gist_id>`.
    #[error("invalid Gist URL format")]
    InvalidGistUrl,

    /// Gist fragment does not start with `#file-`.
    #[error("invalid file specifier in Gist URL")]
    InvalidGistFile,

    /// URL is neither a GitHub nor a Gist URL.
    #[error("query parameter is not a GitHub or Gist URL: {0}")]
    UnsupportedUrl(String),
}

// ---------------------------------------------------------------------------
// Remote references
// ---------------------------------------------------------------------------

/// A notebook file inside a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GithubRef {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch, tag or commit.
    pub branch: String,
    /// Path of the notebook within the repository.
    pub path: String,
}

/// A notebook file inside a GitHub Gist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GistRef {
    /// Gist owner login.
    pub owner: String,
    /// Gist id.
    pub gist_id: String,
    /// File name morphed by [`morph_file_name`], as it appears in the fragment.
    pub file_morphed: String,
}

impl GistRef {
    /// Reference `file_name` inside the gist at `gist_uri`
    /// (`<gist web base>/<owner>/<gist_id>`).
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::InvalidGistUrl`] when the URI does not end in
    /// `<owner>/<gist_id>`.
    pub fn from_gist_uri(gist_uri: &str, file_name: &str) -> Result<Self, LocatorError> {
        let parsed = Url::parse(gist_uri).map_err(|_| LocatorError::InvalidGistUrl)?;
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let [.., owner, gist_id] = segments.as_slice() else {
            return Err(LocatorError::InvalidGistUrl);
        };
        Ok(Self {
            owner: (*owner).to_owned(),
            gist_id: (*gist_id).to_owned(),
            file_morphed: morph_file_name(file_name),
        })
    }
}

/// A remotely hosted notebook.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteRef {
    /// File in a GitHub repository.
    Github(GithubRef),
    /// File in a Gist.
    Gist(GistRef),
}

impl RemoteRef {
    /// Parse a GitHub blob URL or Gist URL.
    ///
    /// In Gist URLs `%23` is decoded to `#` first so that encoded and plain
    /// forms resolve identically. GitHub paths are taken verbatim.
    ///
    /// # Errors
    ///
    /// Returns a [`LocatorError`] describing the malformed part.
    pub fn parse(url: &str) -> Result<Self, LocatorError> {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix(GITHUB_PREFIX) {
            return parse_github(rest, url).map(Self::Github);
        }
        if let Some(rest) = url.strip_prefix(GIST_PREFIX) {
            return parse_gist(&rest.replace("%23", "#")).map(Self::Gist);
        }
        Err(LocatorError::UnsupportedUrl(url.to_owned()))
    }

    /// Storage key under which local edits of this notebook are kept.
    pub fn storage_key(&self) -> StorageKey {
        match self {
            Self::Github(g) => StorageKey(format!(
                "github:{}/{}/{}/{}",
                g.owner, g.repo, g.branch, g.path
            )),
            Self::Gist(g) => StorageKey(format!(
                "gist:{}/{}/{}",
                g.owner, g.gist_id, g.file_morphed
            )),
        }
    }

    /// Canonical web URL (the form accepted by [`RemoteRef::parse`]).
    pub fn web_url(&self) -> String {
        match self {
            Self::Github(g) => format!(
                "{GITHUB_PREFIX}{}/{}/blob/{}/{}",
                g.owner, g.repo, g.branch, g.path
            ),
            Self::Gist(g) => format!(
                "{GIST_PREFIX}{}/{}{GIST_FILE_FRAGMENT}{}",
                g.owner, g.gist_id, g.file_morphed
            ),
        }
    }

    /// Returns the Gist reference, if this is one.
    pub fn as_gist(&self) -> Option<&GistRef> {
        match self {
            Self::Gist(g) => Some(g),
            Self::Github(_) => None,
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.web_url())
    }
}

fn parse_github(rest: &str, url: &str) -> Result<GithubRef, LocatorError> {
    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        [owner, repo, "blob", branch, path @ ..] if !path.is_empty() => Ok(GithubRef {
            owner: (*owner).to_owned(),
            repo: (*repo).to_owned(),
            branch: (*branch).to_owned(),
            path: path.join("/"),
        }),
        _ => Err(LocatorError::InvalidGithubUrl(url.to_owned())),
    }
}

fn parse_gist(rest: &str) -> Result<GistRef, LocatorError> {
    let hash_index = rest.find('#').ok_or(LocatorError::MissingGistFile)?;
    let (path_part, fragment) = rest.split_at(hash_index);

    let mut segments = path_part.split('/');
    let owner = segments.next().unwrap_or_default();
    let gist_id = segments.next().unwrap_or_default();
    if owner.is_empty() || gist_id.is_empty() {
        return Err(LocatorError::InvalidGistUrl);
    }

    let file_morphed = fragment
        .strip_prefix(GIST_FILE_FRAGMENT)
        .ok_or(LocatorError::InvalidGistFile)?;

    Ok(GistRef {
        owner: owner.to_owned(),
        gist_id: gist_id.to_owned(),
        file_morphed: file_morphed.to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Storage keys
// ---------------------------------------------------------------------------

/// Kind of notebook a storage key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Named or default local notebook.
    Local,
    /// Local edits of a GitHub notebook.
    Github,
    /// Local edits of a Gist notebook.
    Gist,
    /// Unrecognised prefix.
    Unknown,
}

impl StorageKind {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Github => "GitHub",
            Self::Gist => "Gist",
            Self::Unknown => "Unknown",
        }
    }
}

/// Key of a notebook in local storage.
///
/// `local:<name>` for named local notebooks, `local` for the default one,
/// `github:<owner>/<repo>/<branch>/<path>` and `gist:<owner>/<id>/<file>`
/// for local copies of remote notebooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wrap a raw key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of a named local notebook.
    pub fn local(name: &str) -> Self {
        Self(format!("local:{name}"))
    }

    /// Key of the default local notebook.
    pub fn default_local() -> Self {
        Self(DEFAULT_LOCAL_KEY.to_owned())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the key by prefix.
    pub fn kind(&self) -> StorageKind {
        if self.0 == DEFAULT_LOCAL_KEY || self.0.starts_with("local:") {
            StorageKind::Local
        } else if self.0.starts_with("github:") {
            StorageKind::Github
        } else if self.0.starts_with("gist:") {
            StorageKind::Gist
        } else {
            StorageKind::Unknown
        }
    }

    /// Display name: the part after the prefix, or the whole key.
    pub fn display_name(&self) -> &str {
        self.0
            .split_once(':')
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Name of a named local notebook (`local:<name>`).
    pub fn local_name(&self) -> Option<&str> {
        self.0.strip_prefix("local:")
    }

    /// Rebuild the remote reference a `github:` or `gist:` key was derived from.
    pub fn remote_ref(&self) -> Option<RemoteRef> {
        if let Some(rest) = self.0.strip_prefix("github:") {
            let mut parts = rest.splitn(4, '/');
            let (owner, repo, branch, path) =
                (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
            return RemoteRef::parse(&format!(
                "{GITHUB_PREFIX}{owner}/{repo}/blob/{branch}/{path}"
            ))
            .ok();
        }
        let rest = self.0.strip_prefix("gist:")?;
        let mut parts = rest.splitn(3, '/');
        let (owner, gist_id, file) = (parts.next()?, parts.next()?, parts.next()?);
        RemoteRef::parse(&format!(
            "{GIST_PREFIX}{owner}/{gist_id}{GIST_FILE_FRAGMENT}{file}"
        ))
        .ok()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Parsed notebook address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotebookParams {
    /// Remote notebook named by the `url` parameter.
    pub remote: Option<RemoteRef>,
    /// Local notebook named by the `localname` parameter.
    pub localname: Option<String>,
    /// `embedded=1` was given.
    pub embedded: bool,
}

impl NotebookParams {
    /// Parse a URL query string such as `?url=...&localname=...`.
    ///
    /// # Errors
    ///
    /// Returns a [`LocatorError`] when `url` is present but malformed.
    pub fn parse_query(query: &str) -> Result<Self, LocatorError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "url" if !value.is_empty() => params.remote = Some(RemoteRef::parse(&value)?),
                "localname" => params.localname = clean_name(&value),
                "embedded" => params.embedded = value == "1",
                _ => {}
            }
        }
        Ok(params)
    }

    /// Address a local notebook; `None` selects the default one.
    pub fn local(name: Option<&str>) -> Self {
        Self {
            localname: name.and_then(clean_name),
            ..Self::default()
        }
    }

    /// Address a remote notebook by URL.
    ///
    /// # Errors
    ///
    /// Returns a [`LocatorError`] when the URL is malformed.
    pub fn remote(url: &str) -> Result<Self, LocatorError> {
        Ok(Self {
            remote: Some(RemoteRef::parse(url)?),
            ..Self::default()
        })
    }

    /// Storage key for this address. A `localname` wins over a remote URL.
    pub fn storage_key(&self) -> StorageKey {
        if let Some(name) = &self.localname {
            return StorageKey::local(name);
        }
        match &self.remote {
            Some(remote) => remote.storage_key(),
            None => StorageKey::default_local(),
        }
    }

    /// Render back into a query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if let Some(remote) = &self.remote {
            out.append_pair("url", &remote.web_url());
        }
        if let Some(name) = &self.localname {
            out.append_pair("localname", name);
        }
        if self.embedded {
            out.append_pair("embedded", "1");
        }
        out.finish()
    }
}

fn clean_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

// ---------------------------------------------------------------------------
// Gist helpers
// ---------------------------------------------------------------------------

/// Morph a file name the way Gist fragments do: every non-alphanumeric
/// ASCII character becomes `-`.
pub fn morph_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// URI of one file inside a Gist: `<gist_uri>#file-<morphed name>`.
pub fn gist_file_uri(gist_uri: &str, file_name: &str) -> String {
    format!(
        "{gist_uri}{GIST_FILE_FRAGMENT}{}",
        morph_file_name(file_name)
    )
}

/// Link that opens a Gist file in the app, with `#` encoded as `%23`.
pub fn share_link(app_base: &str, gist_file_uri: &str) -> String {
    format!(
        "{}/?url={}",
        app_base.trim_end_matches('/'),
        gist_file_uri.replacen('#', "%23", 1)
    )
}
