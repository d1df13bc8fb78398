//! Isolated frame for script-bearing HTML of trusted notebooks.
//!
//! Content is wrapped into a standalone document and delivered through
//! `srcdoc`. The frame's sandbox allows scripts and downloads but never
//! `allow-same-origin`, so the content runs in an opaque origin without
//! access to host storage, access tokens or the host DOM. A small script
//! reports the content height to the host via `postMessage`, tagged with the
//! frame's id so hosts with several frames can route the message.

use ammonia::clean_text;
use uuid::Uuid;

/// Sandbox policy applied to every rendered frame.
pub const SANDBOX_POLICY: &str = "allow-scripts allow-downloads";

/// Message type posted by the resize script.
pub const RESIZE_MESSAGE_TYPE: &str = "resize";

/// A sandboxed frame ready to be embedded in the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedFrame {
    /// Per-frame id carried by resize messages.
    pub frame_id: Uuid,
    /// Full document passed as `srcdoc`.
    pub srcdoc: String,
}

impl SandboxedFrame {
    /// Wrap untrusted-origin HTML into a sandboxed document.
    pub fn new(html: &str) -> Self {
        let frame_id = Uuid::new_v4();
        let srcdoc = format!(
            "<!DOCTYPE html>\n<html>\n  <body>{html}{script}</body>\n</html>",
            script = resize_script(&frame_id),
        );
        Self { frame_id, srcdoc }
    }

    /// Render the `<iframe>` element for the host page.
    pub fn to_html(&self) -> String {
        format!(
            "<iframe data-frame-id=\"{id}\" sandbox=\"{SANDBOX_POLICY}\" \
             style=\"width: 100%; border: none; overflow: hidden;\" srcdoc=\"{doc}\"></iframe>",
            id = self.frame_id,
            doc = clean_text(&self.srcdoc),
        )
    }
}

fn resize_script(frame_id: &Uuid) -> String {
    format!(
        "<script>\n\
         const resizeObserver = new ResizeObserver(() => {{\n\
           const height = document.documentElement.scrollHeight;\n\
           window.parent.postMessage({{ type: '{RESIZE_MESSAGE_TYPE}', height, iframeId: '{frame_id}' }}, '*');\n\
         }});\n\
         resizeObserver.observe(document.body);\n\
         </script>"
    )
}
