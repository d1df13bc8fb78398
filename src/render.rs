//! Whole-notebook rendering through the trust gate.

use ammonia::clean_text;

use crate::notebook::{CellId, CellKind, Notebook};
use crate::trust::{self, Rendering, TrustPrompt};

/// One cell ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell {
    /// Cell id.
    pub id: CellId,
    /// Cell kind.
    pub kind: CellKind,
    /// Markdown cells: sanitized HTML. Code and raw cells: escaped source.
    pub body: String,
    /// Gated outputs, in order.
    pub outputs: Vec<Rendering>,
}

impl RenderedCell {
    /// Number of outputs withheld behind a trust prompt.
    pub fn withheld(&self) -> usize {
        self.outputs.iter().filter(|r| r.is_withheld()).count()
    }
}

/// Render every cell of a notebook, gating outputs by its trust flag.
pub fn render_notebook(notebook: &Notebook) -> Vec<RenderedCell> {
    let trusted = notebook.is_trusted();
    notebook
        .cells()
        .iter()
        .map(|cell| {
            let body = match cell.kind {
                CellKind::Markdown => trust::render_markdown(&cell.source),
                CellKind::Code | CellKind::Raw => clean_text(&cell.source),
            };
            let outputs = cell
                .outputs
                .iter()
                .filter_map(|output| trust::render_output(output, trusted))
                .collect();
            RenderedCell {
                id: cell.id.clone(),
                kind: cell.kind,
                body,
                outputs,
            }
        })
        .collect()
}

/// Total number of withheld outputs across rendered cells.
pub fn withheld_count(cells: &[RenderedCell]) -> usize {
    cells.iter().map(RenderedCell::withheld).sum()
}

/// Standalone HTML page for a rendered notebook.
///
/// When outputs were withheld, a single banner with the trust prompt leads
/// the page in addition to the per-output placeholders.
pub fn render_page(title: &str, cells: &[RenderedCell]) -> String {
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n",
        clean_text(title)
    );
    if withheld_count(cells) > 0 {
        page.push_str("<header>");
        page.push_str(&TrustPrompt::default().to_html());
        page.push_str("</header>\n");
    }
    for cell in cells {
        page.push_str(&format!(
            "<section class=\"cell cell-{}\" id=\"cell-{}\">\n",
            cell.kind.as_str(),
            clean_text(cell.id.as_str())
        ));
        match cell.kind {
            CellKind::Markdown => page.push_str(&cell.body),
            CellKind::Code | CellKind::Raw => {
                page.push_str("<pre class=\"source\"><code>");
                page.push_str(&cell.body);
                page.push_str("</code></pre>");
            }
        }
        for output in &cell.outputs {
            page.push('\n');
            page.push_str(&output.to_html());
        }
        page.push_str("\n</section>\n");
    }
    page.push_str("</body>\n</html>\n");
    page
}
