//! HTML sanitization.
//!
//! Runs over the flattened fragment before any stage that decorates the
//! HTML, so nothing injected downstream is ever stripped. The allowlist
//! extends ammonia's defaults with the markup the structural stages emit:
//! task-list checkboxes, list/heading classes and ids, and emoji image
//! attributes.

use once_cell::sync::Lazy;

static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(build_sanitizer);

fn build_sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder.add_tags(["input"]);
    builder.add_tag_attributes("input", ["type", "checked", "disabled", "class"]);
    builder.add_tag_attributes("ul", ["class"]);
    builder.add_tag_attributes("li", ["class"]);
    builder.add_tag_attributes("pre", ["class"]);
    builder.add_tag_attributes("code", ["class"]);
    builder.add_tag_attributes("span", ["class"]);
    builder.add_tag_attributes("a", ["class", "name"]);
    builder.add_tag_attributes("img", ["class", "width", "height", "align"]);
    for heading in ["h1", "h2", "h3", "h4", "h5", "h6"] {
        builder.add_tag_attributes(heading, ["id"]);
    }
    builder
}

/// Strip disallowed tags and attributes. Total: malformed markup is
/// dropped, never an error.
pub(super) fn clean(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_stripped() {
        let out = clean("<p>hi</p><script>alert(1)</script>");
        assert!(!out.contains("script"));
        assert!(!out.contains("alert"));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn test_event_handlers_are_stripped() {
        let out = clean(r#"<p onclick="x()">hi</p>"#);
        assert!(!out.contains("onclick"));
        assert!(out.contains("hi"));
    }

    #[test]
    fn test_checkbox_markup_survives() {
        let out = clean(
            r#"<ul class="task-list"><li class="task-list-item"><input class="task-list-item-checkbox" type="checkbox" checked disabled> task</li></ul>"#,
        );
        assert!(out.contains("task-list-item-checkbox"));
        assert!(out.contains("checked"));
        assert!(out.contains("disabled"));
        assert!(out.contains(r#"<ul class="task-list">"#));
    }

    #[test]
    fn test_code_language_class_survives() {
        let out = clean(r#"<pre><code class="language-rust">fn main() {}</code></pre>"#);
        assert!(out.contains("language-rust"));
    }

    #[test]
    fn test_heading_id_survives() {
        let out = clean(r#"<h2 id="section">Section</h2>"#);
        assert!(out.contains(r#"id="section""#));
    }

    #[test]
    fn test_inline_style_is_stripped() {
        let out = clean(r#"<p style="color:red">hi</p>"#);
        assert!(!out.contains("style"));
    }
}
