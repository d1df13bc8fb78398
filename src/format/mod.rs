//! Notebook serialization formats.
//!
//! Two interchangeable formats are supported: the structured nbformat JSON
//! ([`ipynb`]) and the paired plain-text percent format ([`jupytext`]).

pub mod ipynb;
pub mod jupytext;

use std::path::Path;

use crate::notebook::{Notebook, Origin};

/// Errors from notebook (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// JSON was malformed or did not match the nbformat schema.
    #[error("invalid notebook json: {0}")]
    Json(#[from] serde_json::Error),

    /// nbformat major version older than 4.
    #[error("unsupported nbformat version {0}, need 4 or newer")]
    UnsupportedVersion(u32),

    /// File name has no recognised notebook extension.
    #[error("unsupported notebook file type: {0}")]
    UnsupportedFileType(String),
}

/// A serialized notebook format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// nbformat v4 JSON (`.ipynb`).
    Ipynb,
    /// Jupytext percent text (`.py`).
    Jupytext,
}

impl Format {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ipynb => "ipynb",
            Self::Jupytext => "py",
        }
    }

    /// Parse a user-supplied format name (`ipynb`, `py`, `jupytext`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ipynb" => Some(Self::Ipynb),
            "py" | "jupytext" | "percent" => Some(Self::Jupytext),
            _ => None,
        }
    }

    /// Detect the format from a file name's extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "ipynb" => Some(Self::Ipynb),
            "py" => Some(Self::Jupytext),
            _ => None,
        }
    }

    /// Serialize a notebook in this format.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Json`] if ipynb serialization fails.
    pub fn serialize(&self, notebook: &Notebook) -> Result<String, FormatError> {
        match self {
            Self::Ipynb => ipynb::to_string_pretty(notebook),
            Self::Jupytext => Ok(jupytext::to_percent(notebook)),
        }
    }

    /// Parse content in this format.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if ipynb content is invalid.
    pub fn parse(&self, content: &str, origin: Origin) -> Result<Notebook, FormatError> {
        match self {
            Self::Ipynb => ipynb::parse(content, origin),
            Self::Jupytext => Ok(jupytext::from_percent(content, origin)),
        }
    }
}

/// Parse an uploaded file, choosing the format by extension.
///
/// The result is untrusted with an [`Origin::Imported`] origin.
///
/// # Errors
///
/// Returns [`FormatError::UnsupportedFileType`] for unknown extensions, or
/// a parse error from the chosen format.
pub fn parse_file(file_name: &str, content: &str) -> Result<Notebook, FormatError> {
    let format = Format::from_file_name(file_name)
        .ok_or_else(|| FormatError::UnsupportedFileType(file_name.to_owned()))?;
    format.parse(
        content,
        Origin::Imported {
            file_name: file_name.to_owned(),
        },
    )
}

/// Parse pasted content: ipynb if it is valid JSON, jupytext otherwise.
///
/// # Errors
///
/// Returns a [`FormatError`] when the content is JSON but not a valid notebook.
pub fn parse_pasted(content: &str) -> Result<Notebook, FormatError> {
    let origin = Origin::Imported {
        file_name: "pasted".to_owned(),
    };
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => ipynb::from_value(value, origin),
        Err(_) => Ok(jupytext::from_percent(content, origin)),
    }
}

/// Suggested download file name for an export.
///
/// Prefers the remote file's base name, then the local notebook name, then
/// `Untitled`. Remote `.ipynb` names get the target extension swapped in.
pub fn download_file_name(
    format: Format,
    remote_path: Option<&str>,
    localname: Option<&str>,
) -> String {
    let ext = format.extension();
    if let Some(path) = remote_path {
        let base = path.rsplit('/').next().unwrap_or(path);
        let stem = base.strip_suffix(".ipynb").unwrap_or(base);
        return format!("{stem}.{ext}");
    }
    match localname {
        Some(name) => format!("{name}.{ext}"),
        None => format!("Untitled.{ext}"),
    }
}
