//! Task-list rewriting: `[ ]`/`[x]` list-item prefixes become checkboxes.
//!
//! Operates on the parsed fragment tree. A list item matches when its
//! immediate text content starts (after optional whitespace) with a
//! literal `[ ]` or `[x]` token followed by a whitespace run and at least
//! one non-whitespace character. Both tight items (`<li>text`) and loose
//! items (`<li><p>text`) are checked, since the parser picks the
//! representation based on source spacing.

use crate::context::RenderContext;
use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use std::collections::{HashMap, HashSet};

struct ItemRewrite {
    /// Item content is wrapped in a paragraph node.
    loose: bool,
    /// Index one past the item's leading run of text events.
    text_end: usize,
    checkbox: String,
    /// Text after the bracket token, whitespace preserved.
    remainder: String,
}

/// Rewrite matching list items in place, tagging them `task-list-item`
/// and their enclosing unordered list `task-list`.
///
/// Nodes with no matching prefix pass through unchanged and are never
/// annotated; running the rewrite on its own output is a no-op.
pub(super) fn rewrite_task_lists<'a>(
    events: Vec<Event<'a>>,
    ctx: &RenderContext,
) -> Vec<Event<'a>> {
    // First walk: find matching items and the lists that contain them.
    // Only unordered lists participate.
    let mut item_rewrites: HashMap<usize, ItemRewrite> = HashMap::new();
    let mut task_lists: HashSet<usize> = HashSet::new();
    let mut list_stack: Vec<(usize, bool)> = Vec::new();

    for i in 0..events.len() {
        match &events[i] {
            Event::Start(Tag::List(start)) => list_stack.push((i, start.is_none())),
            Event::End(TagEnd::List(_)) => {
                list_stack.pop();
            }
            Event::Start(Tag::Item) => {
                let Some(&(list_start, unordered)) = list_stack.last() else {
                    continue;
                };
                if !unordered {
                    continue;
                }
                if let Some(rewrite) = match_task_item(&events, i, ctx) {
                    item_rewrites.insert(i, rewrite);
                    task_lists.insert(list_start);
                }
            }
            _ => {}
        }
    }

    if item_rewrites.is_empty() {
        return events;
    }

    // Second walk: emit the rewritten stream.
    let mut out = Vec::with_capacity(events.len() + item_rewrites.len());
    let mut i = 0;
    while i < events.len() {
        if task_lists.contains(&i) {
            out.push(Event::Html(CowStr::from("<ul class=\"task-list\">\n")));
            i += 1;
            continue;
        }
        if let Some(rewrite) = item_rewrites.get(&i) {
            out.push(Event::Html(CowStr::from("<li class=\"task-list-item\">")));
            i += 1;
            if rewrite.loose {
                // Keep the wrapping paragraph start.
                out.push(events[i].clone());
                i += 1;
            }
            i = rewrite.text_end;
            out.push(Event::Html(CowStr::from(rewrite.checkbox.clone())));
            if !rewrite.remainder.is_empty() {
                out.push(Event::Text(CowStr::from(rewrite.remainder.clone())));
            }
            continue;
        }
        out.push(events[i].clone());
        i += 1;
    }

    out
}

/// Check the leading text of the item starting at `item_idx`.
fn match_task_item(
    events: &[Event<'_>],
    item_idx: usize,
    ctx: &RenderContext,
) -> Option<ItemRewrite> {
    let mut k = item_idx + 1;
    let loose = matches!(events.get(k), Some(Event::Start(Tag::Paragraph)));
    if loose {
        k += 1;
    }

    // The parser may split the leading text over several events (an
    // unmatched `[` opens a potential link), so collect the whole run.
    let mut leading_text = String::new();
    while let Some(Event::Text(text)) = events.get(k) {
        leading_text.push_str(text);
        k += 1;
    }
    if leading_text.is_empty() {
        return None;
    }

    let (checked, remainder) = match_task_token(&leading_text)?;
    Some(ItemRewrite {
        loose,
        text_end: k,
        checkbox: checkbox_markup(checked, ctx.disabled_tasks),
        remainder: remainder.to_string(),
    })
}

/// Anchored match of the bracket token.
///
/// Accepts: optional leading whitespace, literal `[ ]` or `[x]`, a
/// whitespace run, then at least one non-whitespace character. Returns
/// the checked state and the text after the token (whitespace run
/// included); anything else is not a task.
fn match_task_token(text: &str) -> Option<(bool, &str)> {
    let rest = text.trim_start();
    let (checked, after) = if let Some(after) = rest.strip_prefix("[ ]") {
        (false, after)
    } else if let Some(after) = rest.strip_prefix("[x]") {
        (true, after)
    } else {
        return None;
    };

    let trailing = after.trim_start();
    if trailing.len() == after.len() || trailing.is_empty() {
        // No whitespace after the token, or nothing but whitespace.
        return None;
    }

    Some((checked, after))
}

fn checkbox_markup(checked: bool, disabled: bool) -> String {
    let mut markup = String::from("<input class=\"task-list-item-checkbox\" type=\"checkbox\"");
    if checked {
        markup.push_str(" checked");
    }
    if disabled {
        markup.push_str(" disabled");
    }
    markup.push('>');
    markup
}
