//! Reviewer notes attached to cells.
//!
//! Notes live in the cell's nbformat metadata under `nbfiddle_notes`, so
//! they travel with the `.ipynb` file and survive gists and local storage.
//! They are addressed by their position in the list.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Cell, CellId, Notebook, NotebookError};

/// Cell metadata key holding the notes list.
pub const NOTES_METADATA_KEY: &str = "nbfiddle_notes";

/// One note on a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellNote {
    /// Note body.
    pub text: String,
    /// Display name of whoever wrote it.
    pub author: String,
    /// Last write time, ISO 8601 in UTC.
    pub timestamp: String,
}

impl CellNote {
    /// A note stamped with the current time.
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl Cell {
    /// Notes attached to this cell, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::InvalidNotes`] if the metadata entry exists
    /// but is not a list of notes.
    pub fn notes(&self) -> Result<Vec<CellNote>, NotebookError> {
        match self.metadata.get(NOTES_METADATA_KEY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                NotebookError::InvalidNotes {
                    cell: self.id.clone(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    fn set_notes(&mut self, notes: &[CellNote]) -> Result<(), NotebookError> {
        let value = serde_json::to_value(notes).map_err(|e| NotebookError::InvalidNotes {
            cell: self.id.clone(),
            reason: e.to_string(),
        })?;
        self.metadata.insert(NOTES_METADATA_KEY.to_owned(), value);
        Ok(())
    }
}

impl Notebook {
    /// Append a note to a cell. Returns the note's index.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] for an unknown cell or
    /// [`NotebookError::InvalidNotes`] when existing notes are malformed.
    pub fn add_note(&mut self, id: &CellId, note: CellNote) -> Result<usize, NotebookError> {
        let cell = self.note_cell(id)?;
        let mut notes = cell.notes()?;
        notes.push(note);
        cell.set_notes(&notes)?;
        Ok(notes.len().saturating_sub(1))
    }

    /// Replace the note at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::NoteNotFound`] when `index` is out of range,
    /// besides the errors of [`Notebook::add_note`].
    pub fn edit_note(
        &mut self,
        id: &CellId,
        index: usize,
        note: CellNote,
    ) -> Result<(), NotebookError> {
        let cell = self.note_cell(id)?;
        let mut notes = cell.notes()?;
        let slot = notes.get_mut(index).ok_or_else(|| NotebookError::NoteNotFound {
            cell: id.clone(),
            index,
        })?;
        *slot = note;
        cell.set_notes(&notes)
    }

    /// Remove and return the note at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::NoteNotFound`] when `index` is out of range,
    /// besides the errors of [`Notebook::add_note`].
    pub fn delete_note(&mut self, id: &CellId, index: usize) -> Result<CellNote, NotebookError> {
        let cell = self.note_cell(id)?;
        let mut notes = cell.notes()?;
        if index >= notes.len() {
            return Err(NotebookError::NoteNotFound {
                cell: id.clone(),
                index,
            });
        }
        let removed = notes.remove(index);
        cell.set_notes(&notes)?;
        Ok(removed)
    }

    fn note_cell(&mut self, id: &CellId) -> Result<&mut Cell, NotebookError> {
        self.cell_mut(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))
    }
}
