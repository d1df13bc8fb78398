//! Local notebook storage backed by SQLite.
//!
//! [`NotebookStore`] is the sole gateway to `notebooks.db`. Each row holds
//! one serialized notebook under its [`StorageKey`] together with the trust
//! flag it was saved with. The `trust_grants` table records keys the user
//! explicitly trusted, so that a grant for a remote notebook outlives the
//! local copy.
//!
//! Interactive edits go through the debounced [`Autosave`] writer rather
//! than calling [`NotebookStore::save`] on every keystroke.

pub mod writer;

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::format::{ipynb, FormatError};
use crate::locator::{StorageKey, StorageKind};
use crate::notebook::{Notebook, Origin};

pub use self::writer::Autosave;

const SCHEMA_SQL: &str = include_str!("../../migrations/001_notebooks.sql");

const SAVE_NOTEBOOK_SQL: &str =
    "INSERT INTO notebooks (storage_key, content, is_trusted, num_cells, size_bytes, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT(storage_key) DO UPDATE SET \
     content = excluded.content, is_trusted = MAX(notebooks.is_trusted, excluded.is_trusted), \
     num_cells = excluded.num_cells, size_bytes = excluded.size_bytes, \
     updated_at = excluded.updated_at";

const REPLACE_NOTEBOOK_SQL: &str =
    "INSERT INTO notebooks (storage_key, content, is_trusted, num_cells, size_bytes, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT(storage_key) DO UPDATE SET \
     content = excluded.content, is_trusted = excluded.is_trusted, \
     num_cells = excluded.num_cells, size_bytes = excluded.size_bytes, \
     updated_at = excluded.updated_at";

/// Errors from the notebook store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored content could not be (de)serialized.
    #[error("stored notebook is unreadable: {0}")]
    Format(#[from] FormatError),

    /// The database directory could not be created.
    #[error("failed to create storage directory {path}: {source}")]
    Io {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The autosave writer has shut down.
    #[error("autosave writer is closed")]
    WriterClosed,
}

/// A notebook restored from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNotebook {
    /// The notebook, with its stored trust flag applied.
    pub notebook: Notebook,
    /// Whether the notebook was stored trusted or its key holds a grant.
    pub is_trusted: bool,
    /// Last write time (RFC 3339).
    pub updated_at: String,
}

/// Listing entry for a stored notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSummary {
    /// Storage key.
    pub key: StorageKey,
    /// Kind derived from the key prefix.
    pub kind: StorageKind,
    /// Serialized size in bytes.
    pub size_bytes: u64,
    /// Number of cells.
    pub num_cells: u64,
    /// Trust flag as stored.
    pub is_trusted: bool,
    /// Last write time (RFC 3339).
    pub updated_at: String,
}

impl StoredSummary {
    /// Name shown in listings.
    pub fn display_name(&self) -> &str {
        self.key.display_name()
    }
}

/// SQLite-backed notebook store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotebookStore {
    db: SqlitePool,
}

impl NotebookStore {
    /// Open (or create) the store at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database
    /// cannot be opened, or the schema fails to apply.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "notebook store opened");
        Ok(store)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema fails to apply.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        // In-memory databases are per-connection: keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema fails to apply.
    pub async fn from_pool(db: SqlitePool) -> Result<Self, StorageError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&db).await?;
        Ok(Self { db })
    }

    /// Write a notebook under `key`, replacing any previous content.
    ///
    /// Trust only ever goes up here: a stored trusted flag and any grant for
    /// the key survive an untrusted snapshot. Use [`NotebookStore::overwrite`]
    /// to replace a notebook together with its trust.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, key: &StorageKey, notebook: &Notebook) -> Result<(), StorageError> {
        self.write(key, notebook, false).await
    }

    /// Replace the notebook under `key` with new content, dropping any trust
    /// the key held unless `notebook` itself is trusted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn overwrite(&self, key: &StorageKey, notebook: &Notebook) -> Result<(), StorageError> {
        self.write(key, notebook, true).await
    }

    async fn write(
        &self,
        key: &StorageKey,
        notebook: &Notebook,
        replace_trust: bool,
    ) -> Result<(), StorageError> {
        let content = ipynb::to_string_pretty(notebook)?;
        let size_bytes = i64::try_from(content.len()).unwrap_or(i64::MAX);
        let num_cells = i64::try_from(notebook.len()).unwrap_or(i64::MAX);
        let trusted = notebook.is_trusted();
        let upsert = if replace_trust {
            REPLACE_NOTEBOOK_SQL
        } else {
            SAVE_NOTEBOOK_SQL
        };

        let mut tx = self.db.begin().await?;
        sqlx::query(upsert)
            .bind(key.as_str())
            .bind(&content)
            .bind(trusted)
            .bind(num_cells)
            .bind(size_bytes)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        if replace_trust && !trusted {
            sqlx::query("DELETE FROM trust_grants WHERE storage_key = ?1")
                .bind(key.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(key = %key, num_cells, size_bytes, trusted, replace_trust, "notebook saved");
        Ok(())
    }

    /// Load the notebook stored under `key`.
    ///
    /// The origin is derived from the key. The notebook comes back trusted
    /// only if it was stored trusted or the key holds a trust grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored content is unreadable.
    pub async fn load(&self, key: &StorageKey) -> Result<Option<StoredNotebook>, StorageError> {
        let row: Option<(String, bool, String)> = sqlx::query_as(
            "SELECT content, is_trusted, updated_at FROM notebooks WHERE storage_key = ?1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.db)
        .await?;

        let Some((content, stored_trust, updated_at)) = row else {
            return Ok(None);
        };

        let mut notebook = ipynb::parse(&content, origin_for_key(key))?;
        let is_trusted = stored_trust || self.has_grant(key).await?;
        if is_trusted {
            notebook.grant_trust();
        }
        Ok(Some(StoredNotebook {
            notebook,
            is_trusted,
            updated_at,
        }))
    }

    /// List stored notebooks, most recently modified first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> Result<Vec<StoredSummary>, StorageError> {
        let rows: Vec<(String, bool, i64, i64, String)> = sqlx::query_as(
            "SELECT storage_key, is_trusted, num_cells, size_bytes, updated_at \
             FROM notebooks ORDER BY updated_at DESC, storage_key ASC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(key, is_trusted, num_cells, size_bytes, updated_at)| {
                let key = StorageKey::new(key);
                StoredSummary {
                    kind: key.kind(),
                    key,
                    size_bytes: u64::try_from(size_bytes).unwrap_or(0),
                    num_cells: u64::try_from(num_cells).unwrap_or(0),
                    is_trusted,
                    updated_at,
                }
            })
            .collect())
    }

    /// Delete the notebook and any trust grant under `key`.
    ///
    /// Returns `true` if a notebook was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query("DELETE FROM notebooks WHERE storage_key = ?1")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM trust_grants WHERE storage_key = ?1")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        debug!(key = %key, deleted, "notebook deleted");
        Ok(deleted)
    }

    /// Record that the user trusts the notebook under `key`.
    ///
    /// Marks a stored row trusted as well. Granting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn grant_trust(&self, key: &StorageKey) -> Result<(), StorageError> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO trust_grants (storage_key, granted_at) VALUES (?1, ?2)")
            .bind(key.as_str())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE notebooks SET is_trusted = 1 WHERE storage_key = ?1")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(key = %key, "notebook trusted");
        Ok(())
    }

    /// Returns `true` if the key holds a trust grant or a trusted row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn is_trusted(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_trusted FROM notebooks WHERE storage_key = ?1")
                .bind(key.as_str())
                .fetch_optional(&self.db)
                .await?;
        if row.is_some_and(|(trusted,)| trusted) {
            return Ok(true);
        }
        self.has_grant(key).await
    }

    async fn has_grant(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM trust_grants WHERE storage_key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }
}

/// Origin a notebook restored from `key` is attributed to.
pub fn origin_for_key(key: &StorageKey) -> Origin {
    if let Some(remote) = key.remote_ref() {
        return Origin::Remote(remote);
    }
    Origin::Local {
        name: key.local_name().map(str::to_owned),
    }
}
