//! Code cell outputs and MIME bundles.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// MIME type to payload map of a display or execute-result output.
///
/// Text payloads are normalised to JSON strings on read; JSON payloads
/// (`application/json`, `*+json`) are kept as structured values.
pub type MimeBundle = BTreeMap<String, Value>;

/// MIME key of Plotly figure payloads.
pub const PLOTLY_MIME: &str = "application/vnd.plotly.v1+json";

/// An nbformat v4 output.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Text written to stdout or stderr.
    Stream {
        /// Stream name (`stdout` or `stderr`).
        name: String,
        /// Stream text.
        text: String,
    },
    /// Rich display output.
    DisplayData {
        /// MIME bundle.
        data: MimeBundle,
        /// Output metadata.
        metadata: Map<String, Value>,
    },
    /// Result of the last expression of a cell.
    ExecuteResult {
        /// Execution counter.
        execution_count: Option<u32>,
        /// MIME bundle.
        data: MimeBundle,
        /// Output metadata.
        metadata: Map<String, Value>,
    },
    /// Raised exception.
    Error {
        /// Exception class name.
        ename: String,
        /// Exception message.
        evalue: String,
        /// Traceback lines (may carry ANSI colour codes).
        traceback: Vec<String>,
    },
}

impl Output {
    /// Plain-text stdout output.
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::Stream {
            name: "stdout".to_owned(),
            text: text.into(),
        }
    }

    /// Display output with a single MIME entry.
    pub fn display(mime: &str, payload: Value) -> Self {
        let mut data = MimeBundle::new();
        data.insert(mime.to_owned(), payload);
        Self::DisplayData {
            data,
            metadata: Map::new(),
        }
    }

    /// The MIME bundle, for display and execute-result outputs.
    pub fn data(&self) -> Option<&MimeBundle> {
        match self {
            Self::DisplayData { data, .. } | Self::ExecuteResult { data, .. } => Some(data),
            Self::Stream { .. } | Self::Error { .. } => None,
        }
    }

    /// The nbformat `output_type` string.
    pub fn output_type(&self) -> &'static str {
        match self {
            Self::Stream { .. } => "stream",
            Self::DisplayData { .. } => "display_data",
            Self::ExecuteResult { .. } => "execute_result",
            Self::Error { .. } => "error",
        }
    }
}

/// Returns `true` for MIME types whose payload is structured JSON.
pub fn is_json_mime(mime: &str) -> bool {
    mime == "application/json" || mime.ends_with("+json")
}

/// Extract a text payload, joining nbformat multi-line string arrays.
pub fn mime_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => parts
            .iter()
            .map(|p| p.as_str())
            .collect::<Option<Vec<_>>>()
            .map(|lines| lines.concat()),
        _ => None,
    }
}
