//! The markdown-to-HTML transformation pipeline.
//!
//! A render pass threads a [`Fragment`] through an ordered list of
//! [`Stage`]s. Structural stages (task lists, heading anchors) operate on
//! the parsed event tree; whole-document stages (sanitization, attribute
//! rewrites, emoji, highlighting, mentions) operate on HTML text. The
//! event-to-HTML conversion is one-way and happens implicitly the first
//! time an HTML stage runs.
//!
//! Stage order is explicit configuration data, not registration order; the
//! canonical per-mode lists live in [`Pipeline::for_mode`].

mod emoji;
mod heading_anchors;
mod highlight;
mod media;
mod mention;
mod sanitize;
mod task_list;

use crate::context::{RenderContext, RenderMode};
use crate::Error;
use pulldown_cmark::{html, Event, Options, Parser};

/// The working representation of the document between stages.
#[derive(Debug)]
pub enum Fragment<'a> {
    /// Raw markdown source, the pipeline input.
    Markdown(&'a str),
    /// Parsed fragment tree.
    Events(Vec<Event<'a>>),
    /// Rendered HTML text.
    Html(String),
}

impl Fragment<'_> {
    /// Render the fragment down to HTML text.
    ///
    /// Markdown input is parsed with default document options first; in a
    /// configured pipeline this path is never taken because
    /// [`Stage::MarkdownParse`] always runs first.
    pub fn into_html(self) -> String {
        match self {
            Self::Markdown(source) => {
                let mut out = String::new();
                html::push_html(&mut out, Parser::new_ext(source, gfm_options()));
                out
            }
            Self::Events(events) => {
                let mut out = String::new();
                html::push_html(&mut out, events.into_iter());
                out
            }
            Self::Html(html) => html,
        }
    }

    fn repr(&self) -> &'static str {
        match self {
            Self::Markdown(_) => "markdown",
            Self::Events(_) => "events",
            Self::Html(_) => "html",
        }
    }
}

fn gfm_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

/// One transformation step.
///
/// Stages are pure functions of `(fragment, context)`; apart from the
/// parse itself every stage is total, and the absence of a match is a
/// no-op rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parse markdown source into the fragment tree.
    MarkdownParse,
    /// Rewrite literal `[ ]`/`[x]` list-item prefixes into checkboxes.
    TaskListRewrite,
    /// Add stable ids and anchor links to headings.
    HeadingAnchors,
    /// Strip disallowed tags and attributes.
    Sanitize,
    /// Clamp oversized images to the content column.
    ImageWidthClamp,
    /// Upgrade insecure resource URLs to https.
    ProtocolUpgrade,
    /// Replace `:shortcode:` tokens with emoji images.
    EmojiSubstitute,
    /// Highlight fenced code blocks.
    SyntaxHighlight,
    /// Link `@name` mentions to profiles.
    MentionLink,
}

impl Stage {
    /// Apply this stage to the fragment.
    pub fn apply<'a>(
        &self,
        fragment: Fragment<'a>,
        ctx: &RenderContext,
    ) -> Result<Fragment<'a>, Error> {
        match self {
            Self::MarkdownParse => match fragment {
                Fragment::Markdown(source) => Ok(Fragment::Events(parse_markdown(source, ctx))),
                other => Err(Error::StageInput {
                    stage: *self,
                    repr: other.repr(),
                }),
            },
            Self::TaskListRewrite => match fragment {
                Fragment::Events(events) => {
                    Ok(Fragment::Events(task_list::rewrite_task_lists(events, ctx)))
                }
                other => Err(Error::StageInput {
                    stage: *self,
                    repr: other.repr(),
                }),
            },
            Self::HeadingAnchors => match fragment {
                Fragment::Events(events) => {
                    Ok(Fragment::Events(heading_anchors::add_heading_anchors(events)))
                }
                other => Err(Error::StageInput {
                    stage: *self,
                    repr: other.repr(),
                }),
            },
            Self::Sanitize => Ok(Fragment::Html(sanitize::clean(&fragment.into_html()))),
            Self::ImageWidthClamp => Ok(Fragment::Html(media::clamp_image_widths(
                &fragment.into_html(),
            )?)),
            Self::ProtocolUpgrade => Ok(Fragment::Html(media::upgrade_insecure_urls(
                &fragment.into_html(),
                ctx,
            )?)),
            Self::EmojiSubstitute => Ok(Fragment::Html(emoji::substitute_emoji(
                &fragment.into_html(),
                ctx,
            ))),
            Self::SyntaxHighlight => Ok(Fragment::Html(highlight::highlight_fenced_code(
                &fragment.into_html(),
            )?)),
            Self::MentionLink => Ok(Fragment::Html(mention::link_mentions(
                &fragment.into_html(),
                ctx,
            ))),
        }
    }
}

/// Parse markdown with the GFM-style options the preview supports.
///
/// In comment mode single newlines become hard breaks, matching how
/// discussion comments are rendered.
fn parse_markdown<'a>(source: &'a str, ctx: &RenderContext) -> Vec<Event<'a>> {
    let parser = Parser::new_ext(source, gfm_options());
    if ctx.gfm_line_breaks_enabled {
        parser
            .map(|event| match event {
                Event::SoftBreak => Event::HardBreak,
                other => other,
            })
            .collect()
    } else {
        parser.collect()
    }
}

/// An ordered, configurable sequence of transformation stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Build a pipeline from an explicit stage list.
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The canonical stage list for the given mode.
    ///
    /// Order is load-bearing: parsing runs first, structural tree rewrites
    /// run before the events are flattened to HTML, sanitization runs
    /// before every stage that decorates the HTML, and the mode-dependent
    /// terminal stage comes last.
    pub fn for_mode(mode: RenderMode) -> Self {
        let mut stages = vec![Stage::MarkdownParse, Stage::TaskListRewrite];
        if mode == RenderMode::Document {
            stages.push(Stage::HeadingAnchors);
        }
        stages.extend([
            Stage::Sanitize,
            Stage::ImageWidthClamp,
            Stage::ProtocolUpgrade,
            Stage::EmojiSubstitute,
            Stage::SyntaxHighlight,
        ]);
        if mode == RenderMode::Comment {
            stages.push(Stage::MentionLink);
        }
        Self::new(stages)
    }

    /// The configured stage order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run the pipeline over raw markdown, producing the final HTML
    /// fragment text.
    pub fn run(&self, markdown: &str, ctx: &RenderContext) -> Result<String, Error> {
        let mut fragment = Fragment::Markdown(markdown);
        for stage in &self.stages {
            fragment = stage.apply(fragment, ctx)?;
        }
        Ok(fragment.into_html())
    }
}

/// Rewrite the text nodes of an HTML fragment, leaving tags untouched.
///
/// `skip` names elements whose entire content is left alone (tracking
/// nesting, so `<pre><code>..</code></pre>` stays skipped until the outer
/// element closes). Used by the string-substitution stages, which must not
/// fire inside code blocks or existing links.
pub(crate) fn rewrite_text_segments<F>(html: &str, skip: &[&str], mut rewrite: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(html.len());
    let mut skip_depth = 0usize;
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        let (text, tail) = rest.split_at(lt);
        if !text.is_empty() {
            if skip_depth == 0 {
                out.push_str(&rewrite(text));
            } else {
                out.push_str(text);
            }
        }

        let tag_end = tail.find('>').map(|i| i + 1).unwrap_or(tail.len());
        let tag = &tail[..tag_end];
        if let Some((name, closing)) = tag_name(tag) {
            if skip.contains(&name) {
                if closing {
                    skip_depth = skip_depth.saturating_sub(1);
                } else {
                    skip_depth += 1;
                }
            }
        }
        out.push_str(tag);
        rest = &tail[tag_end..];
    }

    if !rest.is_empty() {
        if skip_depth == 0 {
            out.push_str(&rewrite(rest));
        } else {
            out.push_str(rest);
        }
    }

    out
}

/// Extract the (lowercased) element name of a tag token and whether it is
/// a closing tag. Comments and doctypes yield `None`.
fn tag_name(tag: &str) -> Option<(&str, bool)> {
    let inner = tag.strip_prefix('<')?;
    let (inner, closing) = match inner.strip_prefix('/') {
        Some(rest) => (rest, true),
        None => (inner, false),
    };
    let end = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    if end == 0 {
        return None;
    }
    Some((&inner[..end], closing))
}
