//! Notebook document model.
//!
//! A [`Notebook`] is an ordered sequence of [`Cell`]s plus nbformat metadata,
//! the [`Origin`] it was opened from, and a trust flag. The trust flag gates
//! whether script-bearing HTML outputs may render (see [`crate::trust`]).
//!
//! Trust can only move from `false` to `true`: notebooks created in-tool start
//! trusted, everything imported or fetched starts untrusted, and the only way
//! to flip it is [`Notebook::grant_trust`].

pub mod cells;
pub mod notes;
pub mod output;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::locator::RemoteRef;

pub use self::notes::{CellNote, NOTES_METADATA_KEY};
pub use self::output::{mime_text, MimeBundle, Output};

/// nbformat major version written by this crate.
pub const NBFORMAT: u32 = 4;

/// nbformat minor version written by this crate (first version with cell ids).
pub const NBFORMAT_MINOR: u32 = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from notebook model operations.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    /// No cell with the given id exists in the notebook.
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    /// A cell has no note at the given position.
    #[error("cell {cell} has no note at index {index}")]
    NoteNotFound {
        /// Cell the note was looked up in.
        cell: CellId,
        /// Requested note position.
        index: usize,
    },

    /// The cell's notes metadata is not a list of notes.
    #[error("cell {cell} has malformed notes metadata: {reason}")]
    InvalidNotes {
        /// Cell carrying the metadata.
        cell: CellId,
        /// Deserialization failure.
        reason: String,
    },

    /// An unrecognised enum value was encountered.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Stable identifier of a cell within a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type tag of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// Formatted prose.
    Markdown,
    /// Executable source with outputs.
    Code,
    /// Unrendered passthrough text.
    Raw,
}

impl CellKind {
    /// Returns the nbformat `cell_type` string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::Raw => "raw",
        }
    }

    /// Parse an nbformat `cell_type` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised cell type.
    pub fn parse(s: &str) -> Result<Self, NotebookError> {
        match s {
            "markdown" => Ok(Self::Markdown),
            "code" => Ok(Self::Code),
            "raw" => Ok(Self::Raw),
            other => Err(NotebookError::InvalidEnum {
                field: "cell_type",
                value: other.to_owned(),
            }),
        }
    }
}

/// A single markdown, code or raw cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Cell identifier.
    pub id: CellId,
    /// Cell type.
    pub kind: CellKind,
    /// Source text.
    pub source: String,
    /// Free-form nbformat cell metadata.
    pub metadata: Map<String, Value>,
    /// Execution counter (code cells only).
    pub execution_count: Option<u32>,
    /// Outputs from the last execution (code cells only).
    pub outputs: Vec<Output>,
}

impl Cell {
    /// Create a cell of the given kind with a fresh id.
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Self {
            id: CellId::random(),
            kind,
            source: source.into(),
            metadata: Map::new(),
            execution_count: None,
            outputs: Vec::new(),
        }
    }

    /// Create a code cell with a fresh id.
    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    /// Create a markdown cell with a fresh id.
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellKind::Markdown, source)
    }

    /// Returns `true` if this is a code cell.
    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Where a notebook was opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Created fresh inside the tool.
    Created,
    /// Imported from a user-supplied file or pasted content.
    Imported {
        /// File name the content came from (`"pasted"` for clipboard input).
        file_name: String,
    },
    /// Restored from local storage.
    Local {
        /// Local notebook name, `None` for the default notebook.
        name: Option<String>,
    },
    /// Fetched from GitHub or a Gist.
    Remote(RemoteRef),
}

impl Origin {
    /// Whether notebooks with this origin start out trusted.
    pub fn trusted_by_default(&self) -> bool {
        matches!(self, Self::Created)
    }
}

// ---------------------------------------------------------------------------
// Notebook
// ---------------------------------------------------------------------------

/// An ordered sequence of cells with an origin and a trust flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    cells: Vec<Cell>,
    /// Notebook-level nbformat metadata (kernelspec, language_info, ...).
    pub metadata: Map<String, Value>,
    /// nbformat major version.
    pub nbformat: u32,
    /// nbformat minor version.
    pub nbformat_minor: u32,
    origin: Origin,
    trusted: bool,
}

impl Notebook {
    /// Create an empty notebook inside the tool. Always trusted.
    pub fn create() -> Self {
        Self::from_parts(Vec::new(), Map::new(), Origin::Created)
    }

    /// Assemble a notebook from parsed parts.
    ///
    /// The trust flag follows [`Origin::trusted_by_default`]; anything not
    /// created in-tool starts untrusted.
    pub fn from_parts(cells: Vec<Cell>, metadata: Map<String, Value>, origin: Origin) -> Self {
        let trusted = origin.trusted_by_default();
        Self {
            cells,
            metadata,
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            origin,
            trusted,
        }
    }

    /// Returns `true` if script-bearing HTML outputs may render.
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Mark the notebook as trusted.
    ///
    /// Returns `true` if the flag changed. There is no inverse operation.
    pub fn grant_trust(&mut self) -> bool {
        let changed = !self.trusted;
        self.trusted = true;
        changed
    }

    /// Where this notebook was opened from.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Replace the origin. Does not touch the trust flag.
    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    /// Cells in document order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the notebook has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Id of the first cell, if any.
    pub fn first_cell_id(&self) -> Option<&CellId> {
        self.cells.first().map(|c| &c.id)
    }

    /// Position of a cell by id.
    pub fn position(&self, id: &CellId) -> Option<usize> {
        self.cells.iter().position(|c| &c.id == id)
    }

    /// Look up a cell by id.
    pub fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.iter().find(|c| &c.id == id)
    }

    /// Look up a cell by id for mutation.
    pub fn cell_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| &c.id == id)
    }

    /// Append a cell at the end and return its id.
    pub fn push(&mut self, cell: Cell) -> CellId {
        let id = cell.id.clone();
        self.cells.push(cell);
        id
    }

    pub(crate) fn cells_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.cells
    }

    /// Compare the serialized forms of two notebooks.
    ///
    /// Origin and trust are ignored, and so are the plotly HTML fallbacks
    /// that serialization strips.
    pub fn content_eq(&self, other: &Notebook) -> bool {
        match (
            crate::format::ipynb::to_value(self),
            crate::format::ipynb::to_value(other),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self::create()
    }
}
