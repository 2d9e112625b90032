//! Attribute-level rewrites for embedded media: image width clamping and
//! insecure URL upgrades.
//!
//! Both run after sanitization (their attributes would otherwise be
//! stripped) and are independent of each other.

use crate::context::RenderContext;
use crate::Error;
use lol_html::{element, rewrite_str, RewriteStrSettings};

/// Clamp every image to the content column.
///
/// Images carrying their own inline style are left alone.
pub(super) fn clamp_image_widths(html: &str) -> Result<String, Error> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", |el| {
                if el.get_attribute("style").is_none() {
                    el.set_attribute("style", "max-width:100%")?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| Error::Rewrite(err.to_string()))
}

/// Upgrade insecure resource URLs to https.
///
/// Image sources are always upgraded; link targets only when they point at
/// the insecure form of the configured base URL, so third-party http-only
/// sites keep working.
pub(super) fn upgrade_insecure_urls(html: &str, ctx: &RenderContext) -> Result<String, Error> {
    let secure_base = ctx.base_url.clone();
    let insecure_base = secure_base
        .strip_prefix("https://")
        .map(|rest| format!("http://{rest}"));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img[src]", |el| {
                    if let Some(src) = el.get_attribute("src") {
                        if let Some(rest) = src.strip_prefix("http://") {
                            el.set_attribute("src", &format!("https://{rest}"))?;
                        }
                    }
                    Ok(())
                }),
                element!("a[href]", move |el| {
                    if let (Some(href), Some(insecure)) =
                        (el.get_attribute("href"), insecure_base.as_deref())
                    {
                        if let Some(rest) = href.strip_prefix(insecure) {
                            el.set_attribute("href", &format!("{secure_base}{rest}"))?;
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| Error::Rewrite(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_get_clamped() {
        let out = clamp_image_widths(r#"<img src="a.png" alt="">"#).unwrap();
        assert!(out.contains(r#"style="max-width:100%""#));
    }

    #[test]
    fn test_existing_style_kept() {
        let out = clamp_image_widths(r#"<img src="a.png" style="width:10px">"#).unwrap();
        assert!(out.contains("width:10px"));
        assert!(!out.contains("max-width:100%"));
    }

    #[test]
    fn test_insecure_image_src_upgraded() {
        let ctx = RenderContext::default();
        let out = upgrade_insecure_urls(r#"<img src="http://example.com/a.png">"#, &ctx).unwrap();
        assert!(out.contains("https://example.com/a.png"));
    }

    #[test]
    fn test_base_url_links_upgraded() {
        let ctx = RenderContext::default();
        let out =
            upgrade_insecure_urls(r#"<a href="http://github.com/user/repo">r</a>"#, &ctx).unwrap();
        assert!(out.contains(r#"href="https://github.com/user/repo""#));
    }

    #[test]
    fn test_third_party_links_untouched() {
        let ctx = RenderContext::default();
        let out = upgrade_insecure_urls(r#"<a href="http://example.com/">x</a>"#, &ctx).unwrap();
        assert!(out.contains(r#"href="http://example.com/""#));
    }

    #[test]
    fn test_secure_urls_untouched() {
        let ctx = RenderContext::default();
        let html = r#"<img src="https://example.com/a.png" style="max-width:100%">"#;
        assert_eq!(upgrade_insecure_urls(html, &ctx).unwrap(), html);
    }
}
