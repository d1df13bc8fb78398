//! Positional cell operations on a [`Notebook`].

use super::{Cell, CellId, CellKind, Notebook, NotebookError, Output};

impl Notebook {
    /// Insert an empty code cell directly after `after`.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] if `after` is not in the notebook.
    pub fn insert_after(&mut self, after: &CellId) -> Result<CellId, NotebookError> {
        let index = self.require_position(after)?;
        let cell = Cell::code("");
        let id = cell.id.clone();
        self.cells_mut().insert(index.saturating_add(1), cell);
        Ok(id)
    }

    /// Insert an empty code cell directly before `before`.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] if `before` is not in the notebook.
    pub fn insert_before(&mut self, before: &CellId) -> Result<CellId, NotebookError> {
        let index = self.require_position(before)?;
        let cell = Cell::code("");
        let id = cell.id.clone();
        self.cells_mut().insert(index, cell);
        Ok(id)
    }

    /// Delete a cell and return the id that should become active.
    ///
    /// The new active cell is the one preceding the deleted cell, or the new
    /// first cell when the first was deleted. Returns `None` when the id is
    /// unknown (nothing changes) or the notebook is now empty.
    pub fn delete(&mut self, id: &CellId) -> Option<CellId> {
        let index = self.position(id)?;
        self.cells_mut().remove(index);
        let active = index.saturating_sub(1);
        self.cells().get(active).map(|c| c.id.clone())
    }

    /// Flip a cell between code and markdown, keeping source and metadata.
    ///
    /// Raw cells become code cells. Outputs and the execution counter are
    /// dropped. Returns the new kind.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] if the cell does not exist.
    pub fn toggle_kind(&mut self, id: &CellId) -> Result<CellKind, NotebookError> {
        let cell = self
            .cell_mut(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))?;
        cell.kind = match cell.kind {
            CellKind::Code => CellKind::Markdown,
            CellKind::Markdown | CellKind::Raw => CellKind::Code,
        };
        cell.outputs.clear();
        cell.execution_count = None;
        Ok(cell.kind)
    }

    /// Replace a cell's source text.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] if the cell does not exist.
    pub fn set_source(
        &mut self,
        id: &CellId,
        source: impl Into<String>,
    ) -> Result<(), NotebookError> {
        let cell = self
            .cell_mut(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))?;
        cell.source = source.into();
        Ok(())
    }

    /// Replace a code cell's outputs and execution counter.
    ///
    /// Ignored for non-code cells.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] if the cell does not exist.
    pub fn set_outputs(
        &mut self,
        id: &CellId,
        outputs: Vec<Output>,
        execution_count: Option<u32>,
    ) -> Result<(), NotebookError> {
        let cell = self
            .cell_mut(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))?;
        if cell.is_code() {
            cell.outputs = outputs;
            cell.execution_count = execution_count;
        }
        Ok(())
    }

    /// Remove a single cell's outputs and execution counter.
    ///
    /// # Errors
    ///
    /// Returns [`NotebookError::CellNotFound`] if the cell does not exist.
    pub fn clear_outputs(&mut self, id: &CellId) -> Result<(), NotebookError> {
        let cell = self
            .cell_mut(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))?;
        cell.outputs.clear();
        cell.execution_count = None;
        Ok(())
    }

    /// Remove the outputs of every code cell.
    pub fn clear_all_outputs(&mut self) {
        for cell in self.cells_mut() {
            cell.outputs.clear();
            cell.execution_count = None;
        }
    }

    /// Id of the cell after `id`, if any.
    pub fn next_cell(&self, id: &CellId) -> Option<&CellId> {
        let index = self.position(id)?;
        self.cells().get(index.checked_add(1)?).map(|c| &c.id)
    }

    /// Id of the cell before `id`, if any.
    pub fn previous_cell(&self, id: &CellId) -> Option<&CellId> {
        let index = self.position(id)?;
        self.cells().get(index.checked_sub(1)?).map(|c| &c.id)
    }

    fn require_position(&self, id: &CellId) -> Result<usize, NotebookError> {
        self.position(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))
    }
}
