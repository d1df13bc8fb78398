//! nbformat JSON reading and writing.

use serde_json::{json, Value};

use nbfiddle::format::ipynb::{self, size_report};
use nbfiddle::format::{parse_file, parse_pasted, Format, FormatError};
use nbfiddle::notebook::{Cell, CellKind, Notebook, Origin, Output};

const SAMPLE: &str = r##"{
  "cells": [
    {
      "cell_type": "markdown",
      "metadata": {},
      "source": ["# Title\n", "Some *text*"]
    },
    {
      "cell_type": "code",
      "id": "abc123",
      "metadata": {"tags": ["setup"]},
      "execution_count": 2,
      "source": "print('hi')",
      "outputs": [
        {"output_type": "stream", "name": "stdout", "text": ["hi\n"]},
        {
          "output_type": "display_data",
          "data": {"text/html": ["<b>", "bold</b>"], "text/plain": "bold"},
          "metadata": {}
        }
      ]
    }
  ],
  "metadata": {"kernelspec": {"name": "python3"}},
  "nbformat": 4,
  "nbformat_minor": 2
}"##;

fn imported() -> Origin {
    Origin::Imported {
        file_name: "sample.ipynb".to_owned(),
    }
}

#[test]
fn parse_joins_multiline_fields() {
    let nb = ipynb::parse(SAMPLE, imported()).expect("sample should parse");

    assert_eq!(nb.len(), 2);
    assert_eq!(nb.cells()[0].kind, CellKind::Markdown);
    assert_eq!(nb.cells()[0].source, "# Title\nSome *text*");

    let code = &nb.cells()[1];
    assert_eq!(code.id.as_str(), "abc123");
    assert_eq!(code.execution_count, Some(2));
    assert_eq!(code.outputs[0], Output::stdout("hi\n"));
    let data = code.outputs[1].data().expect("display data");
    assert_eq!(data.get("text/html"), Some(&json!("<b>bold</b>")));
}

#[test]
fn parsed_notebooks_start_untrusted() {
    let nb = ipynb::parse(SAMPLE, imported()).expect("sample should parse");
    assert!(!nb.is_trusted());
}

#[test]
fn cells_without_ids_get_fresh_ones() {
    let nb = ipynb::parse(SAMPLE, imported()).expect("sample should parse");
    assert!(!nb.cells()[0].id.as_str().is_empty());
}

#[test]
fn old_nbformat_is_rejected() {
    let json = r#"{"cells": [], "metadata": {}, "nbformat": 3, "nbformat_minor": 0}"#;
    let result = ipynb::parse(json, imported());
    assert!(matches!(result, Err(FormatError::UnsupportedVersion(3))));
}

#[test]
fn malformed_json_is_rejected() {
    let result = ipynb::parse("{\"cells\": [", imported());
    assert!(matches!(result, Err(FormatError::Json(_))));
}

#[test]
fn serialize_stamps_version_and_keeps_metadata() {
    let nb = ipynb::parse(SAMPLE, imported()).expect("sample should parse");
    let text = ipynb::to_string_pretty(&nb).expect("serialize");
    let value: Value = serde_json::from_str(&text).expect("output is json");

    assert_eq!(value["nbformat"], 4);
    assert_eq!(value["nbformat_minor"], 5);
    assert_eq!(value["metadata"]["kernelspec"]["name"], "python3");
    assert_eq!(value["cells"][1]["id"], "abc123");
    assert_eq!(value["cells"][1]["metadata"]["tags"][0], "setup");
    assert_eq!(value["cells"][0]["source"], "# Title\nSome *text*");
    assert!(text.contains("\n  \"cells\""), "two-space indentation");
}

#[test]
fn reparse_preserves_content() {
    let nb = ipynb::parse(SAMPLE, imported()).expect("sample should parse");
    let text = ipynb::to_string_pretty(&nb).expect("serialize");
    let again = ipynb::parse(&text, imported()).expect("reparse");
    assert!(nb.content_eq(&again));
}

#[test]
fn plotly_html_fallback_is_stripped_on_write() {
    let mut cell = Cell::code("fig.show()");
    cell.outputs.push(Output::DisplayData {
        data: [
            (
                "application/vnd.plotly.v1+json".to_owned(),
                json!({"data": [], "layout": {}}),
            ),
            (
                "text/html".to_owned(),
                json!("<script>window.PlotlyConfig = {}</script>"),
            ),
        ]
        .into_iter()
        .collect(),
        metadata: serde_json::Map::new(),
    });
    let mut nb = Notebook::create();
    nb.push(cell);

    let value = ipynb::to_value(&nb).expect("serialize");
    let data = &value["cells"][0]["outputs"][0]["data"];

    assert!(data.get("application/vnd.plotly.v1+json").is_some());
    assert!(data.get("text/html").is_none());
}

#[test]
fn size_report_measures_outputs() {
    let nb = ipynb::parse(SAMPLE, imported()).expect("sample should parse");
    let size = size_report(&nb).expect("size");
    assert!(size.bytes > size.bytes_without_outputs);
}

#[test]
fn parse_file_picks_format_by_extension() {
    let nb = parse_file("notes.ipynb", SAMPLE).expect("ipynb should parse");
    assert_eq!(nb.len(), 2);
    assert_eq!(
        nb.origin(),
        &Origin::Imported {
            file_name: "notes.ipynb".to_owned()
        }
    );

    let nb = parse_file("notes.py", "# %%\nx = 1\n").expect("py should parse");
    assert_eq!(nb.len(), 1);

    let result = parse_file("notes.txt", "x");
    assert!(matches!(result, Err(FormatError::UnsupportedFileType(_))));
}

#[test]
fn pasted_json_parses_as_ipynb() {
    let nb = parse_pasted(SAMPLE).expect("json paste should parse");
    assert_eq!(nb.len(), 2);
    assert!(!nb.is_trusted());
}

#[test]
fn pasted_text_parses_as_jupytext() {
    let nb = parse_pasted("# %% [markdown]\n# Hello\n\n# %%\nprint(1)\n").expect("text paste");
    assert_eq!(nb.len(), 2);
    assert_eq!(nb.cells()[0].kind, CellKind::Markdown);
}

#[test]
fn pasted_json_that_is_not_a_notebook_fails() {
    assert!(parse_pasted(r#"{"hello": "world"}"#).is_err());
}

#[test]
fn format_names_resolve() {
    assert_eq!(Format::from_name("IPYNB"), Some(Format::Ipynb));
    assert_eq!(Format::from_name("jupytext"), Some(Format::Jupytext));
    assert_eq!(Format::from_name("py"), Some(Format::Jupytext));
    assert_eq!(Format::from_name("docx"), None);
}
