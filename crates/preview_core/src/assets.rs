//! Embedded preview assets and the full-document wrapper.
//!
//! The preview file is self-contained: the stylesheet is inlined into the
//! HTML shell, so the output can be opened straight from disk without any
//! sibling assets.

use crate::context::RenderMode;

/// HTML shell with placeholders for the stylesheet, content width, and
/// rendered fragment.
pub const HTML_TEMPLATE: &str = include_str!("../assets/template.html");

/// The preview stylesheet.
pub const PREVIEW_CSS: &str = include_str!("../assets/preview.css");

/// Wrap a rendered HTML fragment in the full preview document.
///
/// The fragment is embedded verbatim; the content column width follows
/// the render mode.
pub fn wrap_preview(fragment: &str, mode: RenderMode) -> String {
    HTML_TEMPLATE
        .replace("/*__PREVIEW_CSS__*/", PREVIEW_CSS)
        .replace("__CONTENT_WIDTH__", &mode.content_width().to_string())
        .replace("<!--__CONTENT__-->", fragment)
}
