//! HTML sanitization for content rendered in the host page.

use ammonia::Builder;

use super::frame::SANDBOX_POLICY;

/// Sanitize HTML for inline rendering.
///
/// Scripts, event handlers and frames are removed. `target` is kept on
/// links, which always get `rel="noopener noreferrer"`.
pub fn clean(html: &str) -> String {
    let mut builder = Builder::default();
    builder.add_generic_attributes(&["target"]);
    builder.clean(html).to_string()
}

/// Sanitize HTML that embeds external pages through `<iframe>`.
///
/// Frames survive, but every frame is forced into the sandbox so the
/// embedded page cannot reach host storage or scripting context.
pub fn clean_with_frames(html: &str) -> String {
    let mut builder = Builder::default();
    builder
        .add_generic_attributes(&["target"])
        .add_tags(&["iframe"])
        .add_tag_attributes(
            "iframe",
            &["src", "width", "height", "frameborder", "allowfullscreen", "title"],
        )
        .set_tag_attribute_value("iframe", "sandbox", SANDBOX_POLICY);
    builder.clean(html).to_string()
}
