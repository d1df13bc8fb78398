//! HTTP response checking with secret redaction.

use std::sync::LazyLock;

use regex::Regex;

use super::RemoteError;

/// Replacement marker for redacted secrets.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Longest error body kept in [`RemoteError::HttpStatus`].
pub const MAX_ERROR_BODY_CHARS: usize = 256;

static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"gh[pousr]_[A-Za-z0-9]{20,}",
        r"github_pat_[A-Za-z0-9_]{20,}",
        r"(?i)bearer\s+[A-Za-z0-9_\-\.]{16,}",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Check the status of a response and return its body text.
///
/// # Errors
///
/// Returns [`RemoteError::Http`] on transport failure and
/// [`RemoteError::HttpStatus`] with a redacted, truncated body on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, RemoteError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(RemoteError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse whitespace, redact token-like values and truncate.
pub fn sanitize_http_error_body(raw: &str) -> String {
    let mut sanitized = redact_tokens(&raw.split_whitespace().collect::<Vec<_>>().join(" "));

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        sanitized = sanitized.chars().take(MAX_ERROR_BODY_CHARS).collect();
        sanitized.push_str("...[truncated]");
    }
    sanitized
}

/// Replace GitHub token-like substrings with [`REDACTION_MARKER`].
pub fn redact_tokens(text: &str) -> String {
    let mut sanitized = text.to_owned();
    for pattern in TOKEN_PATTERNS.iter() {
        sanitized = pattern
            .replace_all(&sanitized, REDACTION_MARKER)
            .into_owned();
    }
    sanitized
}
