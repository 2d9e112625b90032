//! Thin CLI over the preview library.
//!
//! `md-preview <file>` renders the file and watches it for changes;
//! invoking without arguments prints the usage text.

use clap::{CommandFactory, Parser};
use preview_core::{Error, HtmlPreview, PreviewOptions, RenderMode};
use std::path::PathBuf;

/// Preview a markdown file as styled HTML, refreshing on every save.
#[derive(Parser, Debug)]
#[command(name = "md-preview")]
struct Args {
    /// Markdown file to preview.
    file: Option<PathBuf>,

    /// Render the way an inline discussion comment is shown: mentions
    /// linked, hard line breaks, live checkboxes.
    #[arg(long)]
    comment_mode: bool,

    /// Write the preview to this path instead of `<file>.html`.
    #[arg(long)]
    preview_file: Option<PathBuf>,

    /// Remove the preview file when the process exits.
    #[arg(long)]
    delete_on_exit: bool,

    /// Render once and exit instead of watching for changes.
    #[arg(long)]
    once: bool,

    /// Open the generated preview in the default browser.
    #[arg(long)]
    open: bool,

    /// Display the current version.
    #[arg(short = 'v', long = "version")]
    version: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.version {
        println!("md-preview {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let Some(file) = args.file.clone() else {
        let mut cmd = Args::command();
        let _ = cmd.print_help();
        return;
    };

    if let Err(err) = run(file, args) {
        match err.downcast_ref::<Error>() {
            Some(Error::FileNotFound(path)) => {
                eprintln!("No such file: {}", path.display());
            }
            _ => eprintln!("error: {err:?}"),
        }
        std::process::exit(1);
    }
}

fn run(file: PathBuf, args: Args) -> anyhow::Result<()> {
    let mode = if args.comment_mode {
        RenderMode::Comment
    } else {
        RenderMode::Document
    };

    let preview = HtmlPreview::new(
        &file,
        PreviewOptions {
            mode,
            delete_on_exit: args.delete_on_exit,
            preview_file: args.preview_file,
        },
    )?;

    println!("Preview written to {}", preview.preview_file().display());

    if args.open {
        webbrowser::open(&format!("file://{}", preview.preview_file().display()))?;
    }

    if args.once {
        return Ok(());
    }

    preview.watch_blocking()?;
    Ok(())
}
