//! Jupytext percent format and export naming.

use serde_json::Map;

use nbfiddle::format::jupytext::{from_percent, to_percent};
use nbfiddle::format::{download_file_name, Format};
use nbfiddle::notebook::{Cell, CellKind, Notebook, Origin, Output};

fn pasted() -> Origin {
    Origin::Imported {
        file_name: "pasted".to_owned(),
    }
}

#[test]
fn to_percent_writes_markers_and_blank_separators() {
    let cells = vec![
        Cell::markdown("# Title"),
        Cell::code("x = 1\nprint(x)"),
        Cell::new(CellKind::Raw, "raw"),
    ];
    let nb = Notebook::from_parts(cells, Map::new(), Origin::Created);

    assert_eq!(
        to_percent(&nb),
        "# %% [markdown]\n# Title\n\n# %%\nx = 1\nprint(x)\n\n# %% [raw]\nraw\n\n"
    );
}

#[test]
fn round_trip_keeps_order_kinds_and_sources() {
    let mut code = Cell::code("import os\n\nprint(os.getcwd())");
    code.outputs.push(Output::stdout("/tmp\n"));
    let cells = vec![Cell::markdown("## Setup\nText"), code, Cell::code("1 + 1")];
    let nb = Notebook::from_parts(cells, Map::new(), Origin::Created);

    let back = from_percent(&to_percent(&nb), pasted());

    let original: Vec<(CellKind, &str)> = nb
        .cells()
        .iter()
        .map(|c| (c.kind, c.source.as_str()))
        .collect();
    let restored: Vec<(CellKind, &str)> = back
        .cells()
        .iter()
        .map(|c| (c.kind, c.source.as_str()))
        .collect();
    assert_eq!(original, restored);
    assert!(back.cells().iter().all(|c| c.outputs.is_empty()));
}

#[test]
fn text_before_first_marker_becomes_code() {
    let nb = from_percent("import numpy as np\n\n# %% [markdown]\nNotes\n", pasted());

    assert_eq!(nb.len(), 2);
    assert_eq!(nb.cells()[0].kind, CellKind::Code);
    assert_eq!(nb.cells()[0].source, "import numpy as np");
    assert_eq!(nb.cells()[1].source, "Notes");
}

#[test]
fn empty_marked_cells_are_kept() {
    let nb = from_percent("# %%\n\n\n# %%\nx\n", pasted());

    assert_eq!(nb.len(), 2);
    assert_eq!(nb.cells()[0].source, "");
    assert_eq!(nb.cells()[1].source, "x");
}

#[test]
fn round_trip_keeps_empty_cells_blank_edges_and_marker_text() {
    let cells = vec![
        Cell::code(""),
        Cell::code("x = 1\n"),
        Cell::markdown("\nIntro"),
        Cell::code("a = 1\n# %% not a marker\nb = 2"),
        Cell::new(CellKind::Raw, "# # %% already commented\n  "),
    ];
    let nb = Notebook::from_parts(cells, Map::new(), Origin::Created);

    let text = to_percent(&nb);
    assert!(text.contains("\n# # %% not a marker\n"));
    let back = from_percent(&text, pasted());

    let original: Vec<(CellKind, &str)> = nb
        .cells()
        .iter()
        .map(|c| (c.kind, c.source.as_str()))
        .collect();
    let restored: Vec<(CellKind, &str)> = back
        .cells()
        .iter()
        .map(|c| (c.kind, c.source.as_str()))
        .collect();
    assert_eq!(original, restored);
}

#[test]
fn fresh_notebook_survives_export_and_import() {
    let mut nb = Notebook::create();
    nb.push(Cell::code(""));

    let back = from_percent(&to_percent(&nb), pasted());

    assert_eq!(back.len(), 1);
    assert_eq!(back.cells()[0].kind, CellKind::Code);
    assert_eq!(back.cells()[0].source, "");
}

#[test]
fn imported_jupytext_is_untrusted() {
    let nb = from_percent("# %%\nx\n", pasted());
    assert!(!nb.is_trusted());
}

#[test]
fn download_name_prefers_remote_file() {
    assert_eq!(
        download_file_name(Format::Jupytext, Some("docs/analysis.ipynb"), Some("mine")),
        "analysis.py"
    );
    assert_eq!(
        download_file_name(Format::Ipynb, Some("analysis.ipynb"), None),
        "analysis.ipynb"
    );
}

#[test]
fn download_name_falls_back_to_localname_then_untitled() {
    assert_eq!(
        download_file_name(Format::Ipynb, None, Some("scratch")),
        "scratch.ipynb"
    );
    assert_eq!(download_file_name(Format::Jupytext, None, None), "Untitled.py");
}
