//! Core library for the markdown preview tool.
//!
//! Renders a markdown file into a styled HTML preview and keeps the
//! preview synchronized with the source file as it changes on disk.
//!
//! # Modules
//!
//! - [`context`] - Render modes and per-render configuration
//! - [`pipeline`] - The ordered transformation pipeline and its stages
//! - [`preview`] - The preview session (render, watch, callbacks, cleanup)
//! - [`watcher`] - File watching abstraction with polling fallback
//! - [`assets`] - Embedded stylesheet and the full-document wrapper
//!
//! # Example
//!
//! ```no_run
//! use preview_core::{HtmlPreview, PreviewOptions};
//!
//! let preview = HtmlPreview::new("README.md", PreviewOptions::default())?;
//! preview.watch()?; // re-render on every save
//! # Ok::<(), preview_core::Error>(())
//! ```

pub mod assets;
pub mod context;
pub mod pipeline;
pub mod preview;
pub mod watcher;

use std::path::PathBuf;

// Re-export commonly used types at crate root
pub use context::{PreviewOptions, RenderContext, RenderMode};
pub use pipeline::{Fragment, Pipeline, Stage};
pub use preview::HtmlPreview;
pub use watcher::{FileWatcher, WatchEvent, WatcherConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source path did not exist when the session was created.
    #[error("no such file: {0}")]
    FileNotFound(PathBuf),
    /// The source file existed at creation but has since disappeared.
    #[error("source file deleted: {0}")]
    SourceFileMissing(PathBuf),
    /// The configured preview path equals the source path.
    #[error("preview file would overwrite the source file: {0}")]
    PreviewClobbersSource(PathBuf),
    /// The markdown engine rejected the input. The bundled engine is
    /// total, so this only surfaces from a replacement engine.
    #[error("failed to parse markdown: {0}")]
    Parse(String),
    /// A stage received a fragment representation it cannot work on,
    /// i.e. a custom stage list flattened the tree too early.
    #[error("stage {stage:?} cannot run on a {repr} fragment")]
    StageInput { stage: Stage, repr: &'static str },
    /// The streaming HTML rewriter failed.
    #[error("failed to rewrite html: {0}")]
    Rewrite(String),
    /// The watch subscription could not be established.
    #[error("failed to watch {path}: {message}")]
    Watch { path: PathBuf, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
