//! One open notebook: working copy, remote baseline, history and trust.
//!
//! A [`NotebookSession`] is opened from [`NotebookParams`]. Remote notebooks
//! are fetched fresh and kept as the baseline for change detection; a local
//! copy stored under the same key replaces the working notebook. Everything
//! fetched or imported starts untrusted unless its key holds a trust grant.
//!
//! Gist write-back is refused unless the authenticated user owns the gist.
//! A refused write-back leaves the working notebook, its stored copy and the
//! baseline exactly as they were.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::format::{self, ipynb, Format, FormatError};
use crate::history::EditHistory;
use crate::locator::{
    gist_file_uri, share_link, GistRef, LocatorError, NotebookParams, RemoteRef, StorageKey,
};
use crate::notebook::{Cell, Notebook, NotebookError, Origin};
use crate::remote::{validate_gist_file_name, verify_gist_owner, RemoteError, RemoteHost};
use crate::render::{render_notebook, RenderedCell};
use crate::storage::{Autosave, NotebookStore, StorageError};

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Local storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote host failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Notebook content could not be (de)serialized.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A cell operation failed.
    #[error(transparent)]
    Notebook(#[from] NotebookError),

    /// The host returned an unusable gist address.
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Write-back refused because the user does not own the gist.
    #[error("cannot update gist {gist_id}: signed in as {user} but the gist belongs to {owner}; local edits are kept")]
    NotOwner {
        /// Authenticated login.
        user: String,
        /// Gist owner login.
        owner: String,
        /// Gist id.
        gist_id: String,
    },

    /// Write-back requested for a notebook not opened from a gist.
    #[error("notebook was not opened from a gist")]
    NotAGist,

    /// The remote file name is unknown.
    #[error("no remote file path is known for this notebook")]
    NoRemoteFile,
}

/// Result of saving the notebook as a new gist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistSaved {
    /// Gist URI (`<gist web base>/<owner>/<id>`).
    pub gist_uri: String,
    /// URI of the notebook file inside the gist.
    pub file_uri: String,
    /// App link opening the new gist file.
    pub share_link: String,
}

/// Serialized notebook ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    /// Suggested file name.
    pub file_name: String,
    /// File content.
    pub content: String,
}

/// An open notebook.
pub struct NotebookSession {
    store: NotebookStore,
    host: Arc<dyn RemoteHost>,
    params: NotebookParams,
    key: StorageKey,
    notebook: Notebook,
    remote_snapshot: Option<Notebook>,
    remote_file_path: Option<String>,
    history: EditHistory,
    app_base: String,
}

impl std::fmt::Debug for NotebookSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookSession")
            .field("key", &self.key)
            .field("cells", &self.notebook.len())
            .field("trusted", &self.notebook.is_trusted())
            .field("remote_file_path", &self.remote_file_path)
            .finish_non_exhaustive()
    }
}

impl NotebookSession {
    /// Open the notebook addressed by `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch, its parsing, or storage access
    /// fails.
    pub async fn open(
        store: NotebookStore,
        host: Arc<dyn RemoteHost>,
        params: NotebookParams,
        app_base: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let key = params.storage_key();
        let stored = store.load(&key).await?;

        let (notebook, remote_snapshot, remote_file_path) = match &params.remote {
            Some(remote) => {
                let fetched = host.fetch(remote).await?;
                let origin = Origin::Remote(remote.clone());
                let snapshot = ipynb::parse(&fetched.content, origin.clone())?;
                let mut notebook = match stored {
                    Some(stored) => {
                        debug!(key = %key, "using locally modified copy of remote notebook");
                        stored.notebook
                    }
                    None => snapshot.clone(),
                };
                notebook.set_origin(origin);
                (notebook, Some(snapshot), Some(fetched.file_path))
            }
            None => {
                let notebook = match stored {
                    Some(stored) => stored.notebook,
                    None => {
                        let mut notebook = Notebook::create();
                        notebook.push(Cell::code(""));
                        notebook
                    }
                };
                (notebook, None, None)
            }
        };

        let mut session = Self {
            store,
            host,
            params,
            key,
            notebook,
            remote_snapshot,
            remote_file_path,
            history: EditHistory::new(),
            app_base: app_base.into(),
        };
        if !session.notebook.is_trusted() && session.store.is_trusted(&session.key).await? {
            session.notebook.grant_trust();
        }
        session.history.record(session.notebook.clone());

        info!(
            key = %session.key,
            cells = session.notebook.len(),
            trusted = session.notebook.is_trusted(),
            "notebook opened"
        );
        Ok(session)
    }

    /// The working notebook.
    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    /// The address this session was opened with.
    pub fn params(&self) -> &NotebookParams {
        &self.params
    }

    /// Storage key of the working notebook.
    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// Remote baseline, if the notebook came from or was saved to a remote.
    pub fn remote_snapshot(&self) -> Option<&Notebook> {
        self.remote_snapshot.as_ref()
    }

    /// Path of the remote file (repository path or gist file name).
    pub fn remote_file_path(&self) -> Option<&str> {
        self.remote_file_path.as_deref()
    }

    /// Apply an edit to the working notebook and record it for undo.
    ///
    /// Nothing is recorded when the edit fails.
    ///
    /// # Errors
    ///
    /// Returns the edit's error.
    pub fn edit<T>(
        &mut self,
        f: impl FnOnce(&mut Notebook) -> Result<T, NotebookError>,
    ) -> Result<T, SessionError> {
        let value = f(&mut self.notebook)?;
        self.history.record(self.notebook.clone());
        Ok(value)
    }

    /// Step back one edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo().cloned() else {
            return false;
        };
        self.restore(previous);
        true
    }

    /// Step forward one edit. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo().cloned() else {
            return false;
        };
        self.restore(next);
        true
    }

    /// Replace cells from a history snapshot. Origin and trust stay current.
    fn restore(&mut self, mut snapshot: Notebook) {
        snapshot.set_origin(self.notebook.origin().clone());
        if self.notebook.is_trusted() {
            snapshot.grant_trust();
        }
        self.notebook = snapshot;
    }

    /// Render every cell through the trust gate.
    pub fn render(&self) -> Vec<RenderedCell> {
        render_notebook(&self.notebook)
    }

    /// Trust the notebook and remember the grant for its key.
    ///
    /// Returns `true` if the notebook was untrusted before.
    ///
    /// # Errors
    ///
    /// Returns an error if the grant cannot be stored.
    pub async fn grant_trust(&mut self) -> Result<bool, SessionError> {
        self.store.grant_trust(&self.key).await?;
        Ok(self.notebook.grant_trust())
    }

    /// Returns `true` if a remote baseline exists and the working notebook
    /// differs from it.
    pub fn has_local_changes(&self) -> bool {
        self.remote_snapshot
            .as_ref()
            .is_some_and(|snapshot| !snapshot.content_eq(&self.notebook))
    }

    /// Write the working notebook to storage now.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save_local(&self) -> Result<(), SessionError> {
        self.store.save(&self.key, &self.notebook).await?;
        Ok(())
    }

    /// Queue the working notebook on the autosave writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer has stopped.
    pub async fn schedule_save(&self, autosave: &Autosave) -> Result<(), SessionError> {
        autosave
            .schedule(self.key.clone(), self.notebook.clone())
            .await?;
        Ok(())
    }

    /// Create a secret gist holding the working notebook.
    ///
    /// The session is then addressed to the new gist file: the saved content
    /// becomes the remote baseline, so [`NotebookSession::update_gist`] works
    /// right away. A trusted notebook carries its trust over to the gist key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name is not an `.ipynb` name or the
    /// host rejects the request.
    pub async fn save_as_gist(
        &mut self,
        token: &str,
        file_name: &str,
    ) -> Result<GistSaved, SessionError> {
        validate_gist_file_name(file_name)?;
        let content = ipynb::to_string_pretty(&self.notebook)?;
        let gist_uri = self.host.create_gist(token, file_name, &content).await?;
        let file_uri = gist_file_uri(&gist_uri, file_name);
        let link = share_link(&self.app_base, &file_uri);

        let remote = RemoteRef::Gist(GistRef::from_gist_uri(&gist_uri, file_name)?);
        let origin = Origin::Remote(remote.clone());
        self.params = NotebookParams {
            remote: Some(remote),
            localname: None,
            embedded: self.params.embedded,
        };
        self.key = self.params.storage_key();
        if self.notebook.is_trusted() {
            self.store.grant_trust(&self.key).await?;
        }
        self.notebook.set_origin(origin.clone());
        self.remote_snapshot = Some(ipynb::parse(&content, origin)?);
        self.remote_file_path = Some(file_name.to_owned());

        info!(file_uri = %file_uri, key = %self.key, "notebook saved as gist");
        Ok(GistSaved {
            gist_uri,
            file_uri,
            share_link: link,
        })
    }

    /// Write the working notebook back to the gist it was opened from.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAGist`] for non-gist notebooks,
    /// [`SessionError::NotOwner`] when the token's user does not own the
    /// gist, or the host's error.
    pub async fn update_gist(&mut self, token: &str) -> Result<(), SessionError> {
        let gist = self
            .params
            .remote
            .as_ref()
            .and_then(|remote| remote.as_gist())
            .ok_or(SessionError::NotAGist)?
            .clone();
        let file_path = self
            .remote_file_path
            .clone()
            .ok_or(SessionError::NoRemoteFile)?;

        match verify_gist_owner(self.host.as_ref(), token, &gist).await {
            Ok(_) => {}
            Err(RemoteError::NotOwner { user, owner }) => {
                warn!(key = %self.key, "gist update refused, local edits kept");
                return Err(SessionError::NotOwner {
                    user,
                    owner,
                    gist_id: gist.gist_id,
                });
            }
            Err(err) => return Err(err.into()),
        }

        let content = ipynb::to_string_pretty(&self.notebook)?;
        self.host
            .update_gist(token, &gist.gist_id, &file_path, &content)
            .await?;
        self.remote_snapshot = Some(ipynb::parse(&content, self.notebook.origin().clone())?);
        info!(gist_id = %gist.gist_id, file = %file_path, "gist updated from local edits");
        Ok(())
    }

    /// Serialize the working notebook for download.
    ///
    /// # Errors
    ///
    /// Returns an error if ipynb serialization fails.
    pub fn export(&self, format: Format) -> Result<Exported, SessionError> {
        Ok(Exported {
            file_name: format::download_file_name(
                format,
                self.remote_file_path.as_deref(),
                self.params.localname.as_deref(),
            ),
            content: format.serialize(&self.notebook)?,
        })
    }
}

/// Import a file as an untrusted local notebook named `name`.
///
/// Any notebook already stored under `local:<name>` is replaced and loses
/// its trust.
///
/// # Errors
///
/// Returns an error if the file type is unsupported, the content does not
/// parse, or the write fails.
pub async fn import_file(
    store: &NotebookStore,
    name: &str,
    file_name: &str,
    content: &str,
) -> Result<StorageKey, SessionError> {
    let notebook = format::parse_file(file_name, content)?;
    save_imported(store, name, notebook).await
}

/// Import pasted content (ipynb JSON or jupytext) as an untrusted local
/// notebook named `name`.
///
/// # Errors
///
/// Returns an error if JSON content is not a valid notebook or the write fails.
pub async fn import_pasted(
    store: &NotebookStore,
    name: &str,
    content: &str,
) -> Result<StorageKey, SessionError> {
    let notebook = format::parse_pasted(content)?;
    save_imported(store, name, notebook).await
}

async fn save_imported(
    store: &NotebookStore,
    name: &str,
    notebook: Notebook,
) -> Result<StorageKey, SessionError> {
    let key = StorageKey::local(name.trim());
    store.overwrite(&key, &notebook).await?;
    info!(key = %key, cells = notebook.len(), "notebook imported");
    Ok(key)
}
