//! Render modes and the per-render configuration record.
//!
//! A [`RenderContext`] is computed once per session from the chosen
//! [`RenderMode`] and threaded immutably through every pipeline stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Icon/emoji asset host used by the emoji substitution stage.
pub const DEFAULT_ASSET_ROOT: &str = "https://a248.e.akamai.net/assets.github.com/images/icons/";

/// Profile link prefix used by the mention linking stage.
pub const DEFAULT_BASE_URL: &str = "https://github.com/";

/// How the preview is rendered.
///
/// `Document` previews a standalone file the way a repository readme is
/// shown; `Comment` previews text the way an inline discussion comment is
/// shown (mentions linked, hard line breaks, live checkboxes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Standalone file preview.
    #[default]
    Document,
    /// Inline discussion-comment preview.
    Comment,
}

impl RenderMode {
    /// Width in pixels of the rendered content column.
    pub fn content_width(&self) -> u32 {
        match self {
            Self::Document => 722,
            Self::Comment => 712,
        }
    }

    /// Whether `@name` mentions are turned into profile links.
    pub fn mentions_enabled(&self) -> bool {
        matches!(self, Self::Comment)
    }

    /// Whether task-list checkboxes render disabled.
    ///
    /// Document previews are read-only, so their checkboxes are inert;
    /// comment previews keep them interactive.
    pub fn disabled_tasks(&self) -> bool {
        matches!(self, Self::Document)
    }

    /// Whether single newlines render as hard line breaks.
    pub fn gfm_line_breaks_enabled(&self) -> bool {
        matches!(self, Self::Comment)
    }
}

/// Configuration threaded through every pipeline stage.
///
/// Immutable for the duration of one render pass.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Prefix for generated profile links (`@name` mentions).
    pub base_url: String,
    /// Root URL for emoji image assets.
    pub asset_root: String,
    /// Link `@name` mentions to profiles.
    pub mentions_enabled: bool,
    /// Render task-list checkboxes with the `disabled` attribute.
    pub disabled_tasks: bool,
    /// Treat single newlines as hard line breaks.
    pub gfm_line_breaks_enabled: bool,
}

impl RenderContext {
    /// Compute the context for the given mode with the default asset hosts.
    pub fn for_mode(mode: RenderMode) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            mentions_enabled: mode.mentions_enabled(),
            disabled_tasks: mode.disabled_tasks(),
            gfm_line_breaks_enabled: mode.gfm_line_breaks_enabled(),
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::for_mode(RenderMode::default())
    }
}

/// Options accepted when creating a preview session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewOptions {
    /// Render mode, `Document` by default.
    pub mode: RenderMode,
    /// Remove the preview file when the session is dropped.
    pub delete_on_exit: bool,
    /// Destination of the rendered preview; `<source>.html` when unset.
    pub preview_file: Option<PathBuf>,
}
