//! Heading ids and anchor links for document previews.
//!
//! Every heading gets a stable, GitHub-convention id derived from its text
//! plus a leading anchor link, so `#section` fragments resolve in the
//! rendered preview. Duplicate heading text gets a numeric suffix.

use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use std::collections::HashMap;

/// Add an `id` and an anchor link to each heading in the fragment tree.
pub(super) fn add_heading_anchors(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut seen_slugs: HashMap<String, usize> = HashMap::new();

    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Heading {
                level,
                id: _,
                classes,
                attrs,
            }) => {
                // Collect the heading text, skipping inline markup.
                let mut heading_text = String::new();
                let mut j = i + 1;
                while j < events.len() {
                    match &events[j] {
                        Event::Text(text) | Event::Code(text) => {
                            heading_text.push_str(text);
                            j += 1;
                        }
                        Event::End(TagEnd::Heading(_)) => break,
                        _ => j += 1,
                    }
                }

                let slug = slugify(&heading_text.replace('`', ""));
                if slug.is_empty() {
                    out.push(events[i].clone());
                    i += 1;
                    continue;
                }

                let slug = match seen_slugs.get_mut(&slug) {
                    Some(count) => {
                        *count += 1;
                        format!("{slug}-{count}")
                    }
                    None => {
                        seen_slugs.insert(slug.clone(), 0);
                        slug
                    }
                };

                out.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(slug.clone().into()),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
                out.push(Event::Html(CowStr::from(format!(
                    r##"<a class="anchor" href="#{slug}"><span class="octicon octicon-link"></span></a>"##
                ))));
                i += 1;
            }
            _ => {
                out.push(events[i].clone());
                i += 1;
            }
        }
    }

    out
}

/// Converts heading text to a URL-safe slug following GitHub's convention:
/// lowercase, spaces to hyphens, punctuation removed, consecutive hyphens
/// collapsed.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c
            } else if c == ' ' || c == '-' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
