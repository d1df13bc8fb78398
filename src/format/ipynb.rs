//! nbformat v4 (`.ipynb`) JSON codec.
//!
//! Reading accepts multi-line fields either as a string or as a list of
//! strings. Writing always emits single strings with 2-space indentation,
//! stamps nbformat 4.5 and strips the bulky HTML fallback of Plotly figures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::notebook::output::{is_json_mime, PLOTLY_MIME};
use crate::notebook::{
    mime_text, Cell, CellId, CellKind, MimeBundle, Notebook, Origin, Output, NBFORMAT,
    NBFORMAT_MINOR,
};

use super::FormatError;

/// Marker Plotly embeds in its standalone HTML output.
const PLOTLY_HTML_MARKER: &str = "window.PlotlyConfig";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct WireNotebook {
    cells: Vec<WireCell>,
    #[serde(default)]
    metadata: Map<String, Value>,
    nbformat: u32,
    #[serde(default)]
    nbformat_minor: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum WireCell {
    Markdown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        source: MultilineString,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        source: MultilineString,
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        outputs: Vec<WireOutput>,
    },
    Raw {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        source: MultilineString,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
enum WireOutput {
    Stream {
        name: String,
        text: MultilineString,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// nbformat multi-line string: either one string or a list of lines.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum MultilineString {
    One(String),
    Lines(Vec<String>),
}

impl MultilineString {
    fn into_string(self) -> String {
        match self {
            Self::One(s) => s,
            Self::Lines(lines) => lines.concat(),
        }
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Parse `.ipynb` JSON text into a notebook with the given origin.
///
/// # Errors
///
/// Returns [`FormatError::Json`] on malformed JSON or schema mismatch and
/// [`FormatError::UnsupportedVersion`] for nbformat < 4.
pub fn parse(json: &str, origin: Origin) -> Result<Notebook, FormatError> {
    let wire: WireNotebook = serde_json::from_str(json)?;
    from_wire(wire, origin)
}

/// Build a notebook from an already-decoded JSON value.
///
/// # Errors
///
/// Same as [`parse`].
pub fn from_value(value: Value, origin: Origin) -> Result<Notebook, FormatError> {
    let wire: WireNotebook = serde_json::from_value(value)?;
    from_wire(wire, origin)
}

fn from_wire(wire: WireNotebook, origin: Origin) -> Result<Notebook, FormatError> {
    if wire.nbformat < NBFORMAT {
        return Err(FormatError::UnsupportedVersion(wire.nbformat));
    }
    let cells = wire.cells.into_iter().map(cell_from_wire).collect();
    Ok(Notebook::from_parts(cells, wire.metadata, origin))
}

fn cell_from_wire(wire: WireCell) -> Cell {
    let (kind, id, metadata, source, execution_count, outputs) = match wire {
        WireCell::Markdown {
            id,
            metadata,
            source,
        } => (CellKind::Markdown, id, metadata, source, None, Vec::new()),
        WireCell::Code {
            id,
            metadata,
            source,
            execution_count,
            outputs,
        } => (
            CellKind::Code,
            id,
            metadata,
            source,
            execution_count,
            outputs.into_iter().map(output_from_wire).collect(),
        ),
        WireCell::Raw {
            id,
            metadata,
            source,
        } => (CellKind::Raw, id, metadata, source, None, Vec::new()),
    };
    Cell {
        id: id.map(CellId::new).unwrap_or_else(CellId::random),
        kind,
        source: source.into_string(),
        metadata,
        execution_count,
        outputs,
    }
}

fn output_from_wire(wire: WireOutput) -> Output {
    match wire {
        WireOutput::Stream { name, text } => Output::Stream {
            name,
            text: text.into_string(),
        },
        WireOutput::DisplayData { data, metadata } => Output::DisplayData {
            data: normalize_bundle(data),
            metadata,
        },
        WireOutput::ExecuteResult {
            execution_count,
            data,
            metadata,
        } => Output::ExecuteResult {
            execution_count,
            data: normalize_bundle(data),
            metadata,
        },
        WireOutput::Error {
            ename,
            evalue,
            traceback,
        } => Output::Error {
            ename,
            evalue,
            traceback,
        },
    }
}

/// Join line arrays of text MIME payloads into single strings.
fn normalize_bundle(data: MimeBundle) -> MimeBundle {
    data.into_iter()
        .map(|(mime, value)| {
            if is_json_mime(&mime) {
                return (mime, value);
            }
            let value = match mime_text(&value) {
                Some(text) => Value::String(text),
                None => value,
            };
            (mime, value)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Serialize a notebook to an nbformat JSON value.
///
/// # Errors
///
/// Returns [`FormatError::Json`] if serialization fails.
pub fn to_value(notebook: &Notebook) -> Result<Value, FormatError> {
    Ok(serde_json::to_value(to_wire(notebook))?)
}

/// Serialize a notebook to pretty-printed `.ipynb` text.
///
/// # Errors
///
/// Returns [`FormatError::Json`] if serialization fails.
pub fn to_string_pretty(notebook: &Notebook) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(&to_wire(notebook))?)
}

fn to_wire(notebook: &Notebook) -> WireNotebook {
    WireNotebook {
        cells: notebook.cells().iter().map(cell_to_wire).collect(),
        metadata: notebook.metadata.clone(),
        nbformat: NBFORMAT,
        nbformat_minor: notebook.nbformat_minor.max(NBFORMAT_MINOR),
    }
}

fn cell_to_wire(cell: &Cell) -> WireCell {
    let id = Some(cell.id.as_str().to_owned());
    let metadata = cell.metadata.clone();
    let source = MultilineString::One(cell.source.clone());
    match cell.kind {
        CellKind::Markdown => WireCell::Markdown {
            id,
            metadata,
            source,
        },
        CellKind::Raw => WireCell::Raw {
            id,
            metadata,
            source,
        },
        CellKind::Code => WireCell::Code {
            id,
            metadata,
            source,
            execution_count: cell.execution_count,
            outputs: cell.outputs.iter().map(output_to_wire).collect(),
        },
    }
}

fn output_to_wire(output: &Output) -> WireOutput {
    match output {
        Output::Stream { name, text } => WireOutput::Stream {
            name: name.clone(),
            text: MultilineString::One(text.clone()),
        },
        Output::DisplayData { data, metadata } => WireOutput::DisplayData {
            data: strip_plotly_html(data),
            metadata: metadata.clone(),
        },
        Output::ExecuteResult {
            execution_count,
            data,
            metadata,
        } => WireOutput::ExecuteResult {
            execution_count: *execution_count,
            data: data.clone(),
            metadata: metadata.clone(),
        },
        Output::Error {
            ename,
            evalue,
            traceback,
        } => WireOutput::Error {
            ename: ename.clone(),
            evalue: evalue.clone(),
            traceback: traceback.clone(),
        },
    }
}

/// Drop the `text/html` fallback of Plotly display outputs.
///
/// Applies when the bundle carries the Plotly JSON payload, or when the HTML
/// itself is Plotly's standalone bootstrap.
fn strip_plotly_html(data: &MimeBundle) -> MimeBundle {
    let mut data = data.clone();
    let is_plotly_html = data
        .get("text/html")
        .and_then(mime_text)
        .is_some_and(|html| html.contains(PLOTLY_HTML_MARKER));
    if data.contains_key(PLOTLY_MIME) || is_plotly_html {
        data.remove("text/html");
    }
    data
}

// ---------------------------------------------------------------------------
// Size report
// ---------------------------------------------------------------------------

/// Serialized size of a notebook, with and without code outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotebookSize {
    /// Bytes of the pretty-printed `.ipynb`.
    pub bytes: usize,
    /// Bytes of the pretty-printed `.ipynb` after clearing all outputs.
    pub bytes_without_outputs: usize,
}

/// Measure the serialized size of a notebook.
///
/// # Errors
///
/// Returns [`FormatError::Json`] if serialization fails.
pub fn size_report(notebook: &Notebook) -> Result<NotebookSize, FormatError> {
    let bytes = to_string_pretty(notebook)?.len();
    let mut stripped = notebook.clone();
    stripped.clear_all_outputs();
    let bytes_without_outputs = to_string_pretty(&stripped)?.len();
    Ok(NotebookSize {
        bytes,
        bytes_without_outputs,
    })
}
