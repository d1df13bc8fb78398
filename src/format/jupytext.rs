//! Jupytext "percent" paired text format.
//!
//! Each cell is introduced by a marker line: `# %%` for code,
//! `# %% [markdown]` for markdown and `# %% [raw]` for raw cells. The cell
//! body follows verbatim and one blank line separates cells.
//!
//! Source lines that would read as markers (`# %%`, `# # %%`, ...) are
//! written with one extra `# ` and lose it again on import. Together with
//! the single separator line this makes export/import lossless for cell
//! order, types and sources, empty cells included. Outputs do not round trip.

use serde_json::Map;

use crate::notebook::{Cell, CellKind, Notebook, Origin};

/// Prefix of every cell marker line.
pub const CELL_MARKER: &str = "# %%";

const COMMENT_PREFIX: &str = "# ";
const MARKDOWN_TAG: &str = "[markdown]";
const RAW_TAG: &str = "[raw]";

/// Render a notebook in percent format.
pub fn to_percent(notebook: &Notebook) -> String {
    let mut out = String::new();
    for cell in notebook.cells() {
        out.push_str(marker_for(cell.kind));
        out.push('\n');
        for (i, line) in cell.source.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if is_marker_like(line) {
                out.push_str(COMMENT_PREFIX);
            }
            out.push_str(line);
        }
        out.push_str("\n\n");
    }
    out
}

/// Parse percent-format text into a notebook with the given origin.
///
/// Every marker opens a cell, even when its body is empty. Text before the
/// first marker becomes a code cell when it is not blank. Cells get fresh
/// ids and no outputs.
pub fn from_percent(text: &str, origin: Origin) -> Notebook {
    let mut cells = Vec::new();
    let mut current: Option<CellKind> = None;
    let mut body: Vec<&str> = Vec::new();

    let text = text.strip_suffix('\n').unwrap_or(text);
    for line in text.split('\n') {
        if let Some(rest) = line.strip_prefix(CELL_MARKER) {
            flush(&mut cells, current, &body);
            body.clear();
            current = Some(kind_from_marker(rest));
        } else {
            body.push(unescape(line));
        }
    }
    flush(&mut cells, current, &body);

    Notebook::from_parts(cells, Map::new(), origin)
}

fn marker_for(kind: CellKind) -> &'static str {
    match kind {
        CellKind::Code => "# %%",
        CellKind::Markdown => "# %% [markdown]",
        CellKind::Raw => "# %% [raw]",
    }
}

fn kind_from_marker(rest: &str) -> CellKind {
    if rest.contains(MARKDOWN_TAG) {
        CellKind::Markdown
    } else if rest.contains(RAW_TAG) {
        CellKind::Raw
    } else {
        CellKind::Code
    }
}

/// `# %%` behind one or more `# ` prefixes.
fn is_marker_like(line: &str) -> bool {
    let mut rest = line;
    let mut prefixes = 0_usize;
    while let Some(stripped) = rest.strip_prefix(COMMENT_PREFIX) {
        rest = stripped;
        prefixes = prefixes.saturating_add(1);
    }
    prefixes > 0 && rest.starts_with("%%")
}

fn unescape(line: &str) -> &str {
    match line.strip_prefix(COMMENT_PREFIX) {
        Some(rest) if is_marker_like(rest) => rest,
        _ => line,
    }
}

fn flush(cells: &mut Vec<Cell>, kind: Option<CellKind>, body: &[&str]) {
    match kind {
        Some(kind) => {
            let body = match body.split_last() {
                Some((last, rest)) if is_blank(last) => rest,
                _ => body,
            };
            cells.push(Cell::new(kind, body.join("\n")));
        }
        None => {
            let Some(start) = body.iter().position(|l| !is_blank(l)) else {
                return;
            };
            let end = body
                .iter()
                .rposition(|l| !is_blank(l))
                .map_or(start, |i| i.saturating_add(1));
            let source = body.get(start..end).unwrap_or_default().join("\n");
            cells.push(Cell::code(source));
        }
    }
}

fn is_blank(line: &&str) -> bool {
    line.trim().is_empty()
}
