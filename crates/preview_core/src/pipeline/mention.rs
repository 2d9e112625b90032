//! `@name` mention linking, the comment-mode terminal stage.

use crate::context::RenderContext;
use crate::pipeline::rewrite_text_segments;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// A mention is `@` plus a login, anchored at the start of the text or
// preceded by a non-word character so emails never match.
static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\W)@([a-z0-9][a-z0-9-]*)").unwrap());

/// Wrap `@login` mentions in profile links.
///
/// Text inside code blocks and existing links is left untouched.
pub(super) fn link_mentions(html: &str, ctx: &RenderContext) -> String {
    rewrite_text_segments(html, &["a", "pre", "code", "tt"], |text| {
        if !text.contains('@') {
            return text.to_string();
        }
        MENTION_PATTERN
            .replace_all(text, |caps: &Captures| {
                let prefix = &caps[1];
                let login = &caps[2];
                format!(
                    r#"{prefix}<a href="{}{login}" class="user-mention">@{login}</a>"#,
                    ctx.base_url
                )
            })
            .into_owned()
    })
}
