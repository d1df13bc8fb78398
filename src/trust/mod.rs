//! Output trust gate.
//!
//! Every output is classified by its richest renderable MIME type and then
//! passed through [`gate`] together with the owning notebook's trust flag:
//!
//! - images and known widget payloads always render;
//! - HTML without `<script` or `<iframe` is sanitized and rendered inline;
//! - script- or frame-bearing HTML is withheld behind a [`TrustPrompt`]
//!   until the notebook is trusted, and then rendered inside a
//!   [`SandboxedFrame`] (or, for bare `<iframe>` embeds, sanitized with every
//!   frame forced into the same sandbox).
//!
//! No rendering path gives output content `allow-same-origin`.

pub mod frame;
pub mod sanitize;

use std::sync::LazyLock;

use ammonia::clean_text;
use base64::Engine;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::notebook::{mime_text, MimeBundle, Output};

pub use self::frame::{SandboxedFrame, SANDBOX_POLICY};

/// Message shown in place of withheld HTML.
pub const TRUST_PROMPT_MESSAGE: &str =
    "This notebook contains HTML content that will only be displayed if you trust the notebook.";

/// Label of the action that grants trust.
pub const TRUST_ACTION_LABEL: &str = "Click to trust notebook";

const IMAGE_MIMES: [&str; 3] = ["image/png", "image/jpeg", "image/gif"];
const HTML_MIMES: [&str; 2] = ["text/html", "image/svg+xml"];
const WIDGET_MIME_PREFIXES: [&str; 4] = [
    "application/vnd.plotly.",
    "application/vnd.vegalite.",
    "application/vnd.vega.",
    "application/vnd.jupyter.widget-view",
];

static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").ok());

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Content of an output, reduced to its richest renderable representation.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputContent {
    /// Plain text.
    Text(String),
    /// Markdown source.
    Markdown(String),
    /// Base64 bitmap image.
    Image {
        /// Image MIME type.
        mime: String,
        /// Base64 payload with whitespace removed.
        data: String,
    },
    /// Structured payload for a known interactive widget renderer.
    Widget {
        /// Widget MIME type.
        mime: String,
        /// JSON payload.
        payload: Value,
    },
    /// Arbitrary HTML (including SVG markup).
    Html(String),
    /// Raised exception.
    Error {
        /// Exception class name.
        ename: String,
        /// Exception message.
        evalue: String,
        /// Traceback lines.
        traceback: Vec<String>,
    },
}

/// Classify an output. Returns `None` when nothing in it is renderable.
pub fn classify(output: &Output) -> Option<OutputContent> {
    match output {
        Output::Stream { text, .. } => Some(OutputContent::Text(text.clone())),
        Output::Error {
            ename,
            evalue,
            traceback,
        } => Some(OutputContent::Error {
            ename: ename.clone(),
            evalue: evalue.clone(),
            traceback: traceback.clone(),
        }),
        Output::DisplayData { .. } | Output::ExecuteResult { .. } => {
            output.data().and_then(classify_bundle)
        }
    }
}

fn classify_bundle(data: &MimeBundle) -> Option<OutputContent> {
    if let Some((mime, payload)) = data.iter().find(|(mime, _)| is_widget_mime(mime)) {
        return Some(OutputContent::Widget {
            mime: mime.clone(),
            payload: payload.clone(),
        });
    }
    for mime in IMAGE_MIMES {
        if let Some(image) = data.get(mime).and_then(|v| image_payload(mime, v)) {
            return Some(image);
        }
    }
    for mime in HTML_MIMES {
        if let Some(html) = data.get(mime).and_then(mime_text) {
            return Some(OutputContent::Html(html));
        }
    }
    if let Some(markdown) = data.get("text/markdown").and_then(mime_text) {
        return Some(OutputContent::Markdown(markdown));
    }
    data.get("text/plain")
        .and_then(mime_text)
        .map(OutputContent::Text)
}

fn is_widget_mime(mime: &str) -> bool {
    WIDGET_MIME_PREFIXES.iter().any(|p| mime.starts_with(p))
}

fn image_payload(mime: &str, value: &Value) -> Option<OutputContent> {
    let raw = mime_text(value)?;
    let data: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if base64::engine::general_purpose::STANDARD
        .decode(&data)
        .is_err()
    {
        debug!(mime, "skipping image output with invalid base64 payload");
        return None;
    }
    Some(OutputContent::Image {
        mime: mime.to_owned(),
        data,
    })
}

/// Returns `true` if HTML carries scripts or frames and therefore needs trust.
pub fn is_script_bearing(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    lower.contains("<script") || lower.contains("<iframe")
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Placeholder shown instead of HTML withheld from an untrusted notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustPrompt {
    /// Explanation shown to the user.
    pub message: &'static str,
    /// Label of the action that grants trust.
    pub action: &'static str,
}

impl Default for TrustPrompt {
    fn default() -> Self {
        Self {
            message: TRUST_PROMPT_MESSAGE,
            action: TRUST_ACTION_LABEL,
        }
    }
}

impl TrustPrompt {
    /// HTML placeholder with the grant action.
    pub fn to_html(&self) -> String {
        format!(
            "<div class=\"trust-prompt\"><p>{}</p>\
             <button type=\"button\" data-action=\"grant-trust\">{}</button></div>",
            clean_text(self.message),
            clean_text(self.action),
        )
    }
}

/// Gate decision for one output.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendering {
    /// Preformatted text.
    Text(String),
    /// Sanitized HTML produced from markdown.
    Markdown(String),
    /// Image rendered from a data URI.
    Image {
        /// Image MIME type.
        mime: String,
        /// `data:` URI.
        data_uri: String,
    },
    /// Widget payload handed to its renderer.
    Widget {
        /// Widget MIME type.
        mime: String,
        /// JSON payload.
        payload: Value,
    },
    /// Sanitized HTML rendered in the host page.
    InlineHtml(String),
    /// HTML withheld until the notebook is trusted.
    Withheld(TrustPrompt),
    /// HTML rendered inside an isolated frame.
    Sandboxed(SandboxedFrame),
    /// Exception with ANSI codes removed from the traceback.
    Error {
        /// Exception class name.
        ename: String,
        /// Exception message.
        evalue: String,
        /// Cleaned traceback lines.
        traceback: Vec<String>,
    },
}

impl Rendering {
    /// Returns `true` if the output was withheld behind a trust prompt.
    pub fn is_withheld(&self) -> bool {
        matches!(self, Self::Withheld(_))
    }

    /// HTML fragment for the host page.
    pub fn to_html(&self) -> String {
        match self {
            Self::Text(text) => format!("<pre class=\"output-text\">{}</pre>", clean_text(text)),
            Self::Markdown(html) | Self::InlineHtml(html) => {
                format!("<div class=\"output-html\">{html}</div>")
            }
            Self::Image { data_uri, .. } => {
                format!("<img class=\"output-image\" src=\"{}\">", clean_text(data_uri))
            }
            Self::Widget { mime, payload } => format!(
                "<div class=\"output-widget\" data-mime=\"{}\" data-payload=\"{}\"></div>",
                clean_text(mime),
                clean_text(&payload.to_string()),
            ),
            Self::Withheld(prompt) => prompt.to_html(),
            Self::Sandboxed(frame) => frame.to_html(),
            Self::Error {
                ename,
                evalue,
                traceback,
            } => format!(
                "<pre class=\"output-error\"><strong>{}: {}</strong>\n{}</pre>",
                clean_text(ename),
                clean_text(evalue),
                clean_text(&traceback.join("\n")),
            ),
        }
    }
}

/// Decide how classified content renders given the notebook's trust flag.
pub fn gate(content: OutputContent, trusted: bool) -> Rendering {
    match content {
        OutputContent::Text(text) => Rendering::Text(text),
        OutputContent::Markdown(source) => Rendering::Markdown(render_markdown(&source)),
        OutputContent::Image { mime, data } => Rendering::Image {
            data_uri: format!("data:{mime};base64,{data}"),
            mime,
        },
        OutputContent::Widget { mime, payload } => Rendering::Widget { mime, payload },
        OutputContent::Html(html) => gate_html(&html, trusted),
        OutputContent::Error {
            ename,
            evalue,
            traceback,
        } => Rendering::Error {
            ename,
            evalue,
            traceback: traceback.iter().map(|line| strip_ansi(line)).collect(),
        },
    }
}

fn gate_html(html: &str, trusted: bool) -> Rendering {
    if !is_script_bearing(html) {
        return Rendering::InlineHtml(sanitize::clean(html));
    }
    if !trusted {
        debug!("withholding script-bearing html output until notebook is trusted");
        return Rendering::Withheld(TrustPrompt::default());
    }
    if html.trim_start().to_ascii_lowercase().starts_with("<iframe") {
        Rendering::InlineHtml(sanitize::clean_with_frames(html))
    } else {
        Rendering::Sandboxed(SandboxedFrame::new(html))
    }
}

/// Classify and gate one output in a single step.
pub fn render_output(output: &Output, trusted: bool) -> Option<Rendering> {
    classify(output).map(|content| gate(content, trusted))
}

/// Render markdown to sanitized HTML.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(source, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    sanitize::clean(&out)
}

/// Remove ANSI colour escapes from terminal text.
pub fn strip_ansi(text: &str) -> String {
    match ANSI_ESCAPE.as_ref() {
        Some(regex) => regex.replace_all(text, "").into_owned(),
        None => text.to_owned(),
    }
}
