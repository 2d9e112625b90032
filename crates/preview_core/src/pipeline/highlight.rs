//! Syntax highlighting for fenced code blocks.
//!
//! Runs after sanitization so the injected `<span>` markup is not itself
//! stripped. Code blocks without a recognized `language-*` class pass
//! through untouched; highlighter failures degrade to the plain escaped
//! text, never an error.

use crate::Error;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::rc::Rc;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Re-render the contents of `pre > code` blocks through the highlighter.
pub(super) fn highlight_fenced_code(html: &str) -> Result<String, Error> {
    // The element handler sees the language class before the text chunks
    // of the same block arrive, so a shared cell carries it over.
    let language: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let pending: Rc<RefCell<String>> = Rc::new(RefCell::new(String::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("pre > code", {
                    let language = Rc::clone(&language);
                    move |el| {
                        *language.borrow_mut() = el.get_attribute("class").and_then(|classes| {
                            classes
                                .split_whitespace()
                                .find_map(|class| class.strip_prefix("language-"))
                                .map(str::to_owned)
                        });
                        Ok(())
                    }
                }),
                text!("pre > code", {
                    let language = Rc::clone(&language);
                    let pending = Rc::clone(&pending);
                    move |chunk| {
                        if language.borrow().is_none() {
                            return Ok(());
                        }
                        pending.borrow_mut().push_str(chunk.as_str());
                        let finished = chunk.last_in_text_node();
                        chunk.remove();
                        if finished {
                            let rendered = {
                                let source = unescape_entities(&pending.borrow());
                                highlight(language.borrow().as_deref(), &source)
                            };
                            chunk.after(&rendered, ContentType::Html);
                            pending.borrow_mut().clear();
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| Error::Rewrite(err.to_string()))
}

fn highlight(language: Option<&str>, code: &str) -> String {
    let Some(token) = language else {
        return escape_text(code);
    };
    let Some(syntax) = SYNTAX_SET.find_syntax_by_token(token) else {
        return escape_text(code);
    };

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
            tracing::warn!(%err, language = token, "Highlighting failed, leaving code block plain");
            return escape_text(code);
        }
    }
    generator.finalize()
}

/// Decode the entities the HTML renderer produces in code text.
fn unescape_entities(text: &str) -> String {
    const ENTITIES: &[(&str, char)] = &[
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
        ("&#x27;", '\''),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
