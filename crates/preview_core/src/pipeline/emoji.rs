//! Emoji shortcode substitution.
//!
//! `:shortcode:` tokens in text become `<img class="emoji">` elements
//! served from the configured asset root. Unknown shortcodes and tokens
//! inside code blocks are left untouched.

use crate::context::RenderContext;
use crate::pipeline::rewrite_text_segments;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static EMOJI_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-z0-9_+-]+):").unwrap());

/// Shortcodes with a known image asset, sorted for binary search.
const EMOJI_NAMES: &[&str] = &[
    "+1",
    "-1",
    "100",
    "arrow_down",
    "arrow_up",
    "art",
    "bell",
    "blush",
    "boom",
    "bug",
    "bulb",
    "checkered_flag",
    "clap",
    "cloud",
    "confused",
    "construction",
    "cry",
    "eyes",
    "fire",
    "fireworks",
    "grin",
    "grinning",
    "hammer",
    "heart",
    "heart_eyes",
    "joy",
    "laughing",
    "lock",
    "mag",
    "memo",
    "metal",
    "moneybag",
    "muscle",
    "neutral_face",
    "octocat",
    "ok_hand",
    "pencil",
    "point_down",
    "point_left",
    "point_right",
    "point_up",
    "pray",
    "question",
    "rage",
    "relieved",
    "rocket",
    "scream",
    "see_no_evil",
    "shipit",
    "smile",
    "smiley",
    "smirk",
    "sob",
    "sparkles",
    "squirrel",
    "star",
    "star2",
    "stuck_out_tongue",
    "sunglasses",
    "tada",
    "thought_balloon",
    "thumbsdown",
    "thumbsup",
    "trophy",
    "unamused",
    "warning",
    "wave",
    "wink",
    "wrench",
    "x",
    "zap",
];

/// Replace known `:shortcode:` tokens outside of code with emoji images.
pub(super) fn substitute_emoji(html: &str, ctx: &RenderContext) -> String {
    rewrite_text_segments(html, &["pre", "code", "tt"], |text| {
        if !text.contains(':') {
            return text.to_string();
        }
        EMOJI_PATTERN
            .replace_all(text, |caps: &Captures| {
                let name = &caps[1];
                if EMOJI_NAMES.binary_search(&name).is_ok() {
                    emoji_markup(name, &ctx.asset_root)
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    })
}

fn emoji_markup(name: &str, asset_root: &str) -> String {
    format!(
        r#"<img class="emoji" title=":{name}:" alt=":{name}:" src="{asset_root}emoji/{name}.png" height="20" width="20" align="absmiddle">"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitute(html: &str) -> String {
        substitute_emoji(html, &RenderContext::default())
    }

    #[test]
    fn test_emoji_table_is_sorted() {
        assert!(EMOJI_NAMES.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_known_shortcode_becomes_image() {
        let out = substitute("<p>ship it :shipit:</p>");
        assert!(out.contains(r#"class="emoji""#));
        assert!(out.contains("emoji/shipit.png"));
        assert!(out.contains(r#"alt=":shipit:""#));
    }

    #[test]
    fn test_unknown_shortcode_untouched() {
        let html = "<p>:definitely_not_an_emoji:</p>";
        assert_eq!(substitute(html), html);
    }

    #[test]
    fn test_code_blocks_untouched() {
        let html = "<pre><code>:smile:</code></pre>";
        assert_eq!(substitute(html), html);
    }

    #[test]
    fn test_multiple_shortcodes() {
        let out = substitute("<p>:+1: :tada:</p>");
        assert!(out.contains("emoji/+1.png"));
        assert!(out.contains("emoji/tada.png"));
    }

    #[test]
    fn test_plain_colons_untouched() {
        let html = "<p>key: value</p>";
        assert_eq!(substitute(html), html);
    }
}
