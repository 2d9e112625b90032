//! The preview session: one watched source file, one preview file.
//!
//! An [`HtmlPreview`] renders its source once at creation and again on
//! every [`update`](HtmlPreview::update), optionally driven by a file
//! watch. Renders are serialized per session and the preview file is
//! replaced atomically, so concurrent updates can never leave a partially
//! written document behind.

use crate::assets;
use crate::context::{PreviewOptions, RenderContext, RenderMode};
use crate::pipeline::Pipeline;
use crate::watcher::{FileWatcher, WatchEvent, WatcherConfig};
use crate::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

type UpdateCallback = Box<dyn Fn() + Send + 'static>;

struct PreviewInner {
    source_file: PathBuf,
    preview_file: PathBuf,
    mode: RenderMode,
    context: RenderContext,
    pipeline: Pipeline,
    update_callbacks: Mutex<Vec<UpdateCallback>>,
    // Serializes the read-transform-write-notify sequence.
    render_lock: Mutex<()>,
}

impl PreviewInner {
    fn update(&self) -> Result<(), Error> {
        let _guard = self
            .render_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let markdown = match std::fs::read_to_string(&self.source_file) {
            Ok(markdown) => markdown,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SourceFileMissing(self.source_file.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let fragment = self.pipeline.run(&markdown, &self.context)?;
        let preview_html = assets::wrap_preview(&fragment, self.mode);
        self.write_atomically(&preview_html)?;

        let callbacks = self
            .update_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback();
        }

        Ok(())
    }

    /// Write the complete document to a temporary file in the destination
    /// directory and rename it over the preview path, so readers never
    /// observe a partial write.
    fn write_atomically(&self, preview_html: &str) -> Result<(), Error> {
        let dir = match self.preview_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(preview_html.as_bytes())?;
        tmp.persist(&self.preview_file)
            .map_err(|err| Error::Io(err.error))?;
        Ok(())
    }
}

struct WatchHandle {
    // Dropping the backend stops event delivery; the worker then drains
    // the channel and exits on its own. The flag covers external sources
    // whose sender outlives the watch: the worker re-checks it on every
    // event before rendering.
    backend: crate::watcher::Backend,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// A live preview of one markdown file.
///
/// Created over an existing source file; the initial render happens
/// synchronously inside the constructor, so the preview file can be read
/// as soon as construction returns.
pub struct HtmlPreview {
    inner: Arc<PreviewInner>,
    watch: Mutex<Option<WatchHandle>>,
    delete_on_exit: bool,
}

impl HtmlPreview {
    /// Create a session over `source_file` and render it once.
    ///
    /// The path is resolved to an absolute, symlink-free form; a missing
    /// file fails with [`Error::FileNotFound`] and produces no session.
    pub fn new(source_file: impl AsRef<Path>, options: PreviewOptions) -> Result<Self, Error> {
        let source_file = source_file.as_ref();
        let source_file = source_file
            .canonicalize()
            .map_err(|_| Error::FileNotFound(source_file.to_path_buf()))?;

        let preview_file = options.preview_file.unwrap_or_else(|| {
            let mut file = source_file.clone().into_os_string();
            file.push(".html");
            PathBuf::from(file)
        });
        if preview_file == source_file {
            return Err(Error::PreviewClobbersSource(preview_file));
        }

        let preview = Self {
            inner: Arc::new(PreviewInner {
                source_file,
                preview_file,
                mode: options.mode,
                context: RenderContext::for_mode(options.mode),
                pipeline: Pipeline::for_mode(options.mode),
                update_callbacks: Mutex::new(Vec::new()),
                render_lock: Mutex::new(()),
            }),
            watch: Mutex::new(None),
            delete_on_exit: options.delete_on_exit,
        };

        preview.update()?;
        Ok(preview)
    }

    /// The canonicalized source path.
    pub fn source_file(&self) -> &Path {
        &self.inner.source_file
    }

    /// Where the rendered preview is written.
    pub fn preview_file(&self) -> &Path {
        &self.inner.preview_file
    }

    /// Re-render the source file into the preview file.
    ///
    /// Fails with [`Error::SourceFileMissing`] when the file existed at
    /// creation but has since disappeared. Registered callbacks fire in
    /// registration order after the preview file is in place.
    pub fn update(&self) -> Result<(), Error> {
        self.inner.update()
    }

    /// Register a callback fired after every successful update.
    ///
    /// Multiple registrations are all retained. The initial render runs
    /// inside the constructor, before any callback can be registered, so
    /// callbacks observe every update except that first one.
    pub fn on_update(&self, callback: impl Fn() + Send + 'static) {
        self.inner
            .update_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Watch the source file for changes, updating the preview on each
    /// one. Non-blocking; a second call while watching is a no-op.
    pub fn watch(&self) -> Result<(), Error> {
        if self
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            return Ok(());
        }
        let watcher = FileWatcher::new(&self.inner.source_file, WatcherConfig::default())?;
        self.watch_with(watcher);
        Ok(())
    }

    /// Like [`watch`](Self::watch) but drives updates from an explicit
    /// change source, e.g. a fake event stream in tests.
    pub fn watch_with(&self, watcher: FileWatcher) {
        let FileWatcher { events, backend } = watcher;
        let inner = Arc::clone(&self.inner);
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_cancelled = Arc::clone(&cancelled);
        let worker = std::thread::spawn(move || {
            while let Ok(event) = events.recv() {
                if worker_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                match event {
                    WatchEvent::Error(message) => {
                        tracing::warn!(%message, "File watcher reported an error");
                    }
                    WatchEvent::Modified(_) => match inner.update() {
                        Ok(()) => {}
                        Err(Error::SourceFileMissing(path)) => {
                            tracing::error!(
                                path = %path.display(),
                                "Source file deleted, stopping watch"
                            );
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(%err, "Failed to update preview");
                        }
                    },
                }
            }
        });

        *self.watch.lock().unwrap_or_else(PoisonError::into_inner) = Some(WatchHandle {
            backend,
            cancelled,
            worker: Some(worker),
        });
    }

    /// Watch and park the calling thread until the watch ends — via
    /// [`end_watch`](Self::end_watch) from another thread, or because the
    /// source file disappeared.
    pub fn watch_blocking(&self) -> Result<(), Error> {
        self.watch()?;
        let worker = self
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .and_then(|handle| handle.worker.take());
        if let Some(worker) = worker {
            let _ = worker.join();
        }
        Ok(())
    }

    /// Stop watching. Idempotent; an update already in flight completes
    /// and writes normally, only future events are suppressed.
    pub fn end_watch(&self) {
        let handle = self
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(handle);
    }

    /// Delete the preview file. Not an error if it is already gone.
    pub fn delete(&self) -> Result<(), Error> {
        match std::fs::remove_file(&self.inner.preview_file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for HtmlPreview {
    fn drop(&mut self) {
        // Stop the watch and let an in-flight render finish before any
        // cleanup touches the preview file.
        let handle = self
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = handle {
            let worker = handle.worker.take();
            // A worker on an external source may stay parked on its
            // channel until the far sender closes; only internal backends
            // guarantee the channel closes when the handle drops.
            let join_worker = !matches!(handle.backend, crate::watcher::Backend::External);
            drop(handle);
            if let (true, Some(worker)) = (join_worker, worker) {
                let _ = worker.join();
            }
        }

        if self.delete_on_exit {
            if let Err(err) = self.delete() {
                tracing::warn!(%err, "Failed to delete preview file on exit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn write_source(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    /// Poll until the condition holds, failing after a generous timeout.
    fn wait_for(mut condition: impl FnMut() -> bool) {
        let start = Instant::now();
        while !condition() {
            assert!(
                start.elapsed() < Duration::from_secs(30),
                "async operation timed out"
            );
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    fn test_preview_created_on_init() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();
        assert!(read(preview.preview_file()).contains("foo</h2>"));
    }

    #[test]
    fn test_preview_file_beside_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();
        assert_eq!(
            preview.preview_file().parent(),
            preview.source_file().parent()
        );
        assert!(preview
            .preview_file()
            .to_string_lossy()
            .ends_with("test.md.html"));
    }

    #[test]
    fn test_preview_path_override() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let custom = dir.path().join("out.html");
        let preview = HtmlPreview::new(
            &source,
            PreviewOptions {
                preview_file: Some(custom.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(preview.preview_file(), custom);
        assert!(custom.exists());
    }

    #[test]
    fn test_preview_must_not_clobber_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let result = HtmlPreview::new(
            &source,
            PreviewOptions {
                preview_file: Some(source.canonicalize().unwrap()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::PreviewClobbersSource(_))));
    }

    #[test]
    fn test_comment_mode_session() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "@username");
        let preview = HtmlPreview::new(
            &source,
            PreviewOptions {
                mode: RenderMode::Comment,
                ..Default::default()
            },
        )
        .unwrap();

        let html = read(preview.preview_file());
        assert!(html.contains(r#"class="user-mention""#));
        assert!(html.contains("width: 712px;"));
    }

    #[test]
    fn test_document_mode_session_keeps_mentions_literal() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "@username");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();

        let html = read(preview.preview_file());
        assert!(html.contains("@username"));
        // The stylesheet mentions the class; the markup must not.
        assert!(!html.contains(r#"class="user-mention""#));
        assert!(html.contains("width: 722px;"));
    }

    #[test]
    fn test_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("this_file_does_not_exist.md");
        let result = HtmlPreview::new(&missing, PreviewOptions::default());
        assert!(matches!(result, Err(Error::FileNotFound(_))));
        assert!(!dir.path().join("this_file_does_not_exist.md.html").exists());
    }

    #[test]
    fn test_update_rerenders() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();
        assert!(read(preview.preview_file()).contains("foo</h2>"));

        std::fs::write(&source, "## foo bar").unwrap();
        preview.update().unwrap();
        assert!(read(preview.preview_file()).contains("foo bar</h2>"));
    }

    #[test]
    fn test_file_deleted_behind_us() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();
        std::fs::remove_file(&source).unwrap();
        assert!(matches!(
            preview.update(),
            Err(Error::SourceFileMissing(_))
        ));
    }

    #[test]
    fn test_update_callbacks_fire_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        for id in ["first", "second"] {
            let calls = Arc::clone(&calls);
            preview.on_update(move || calls.lock().unwrap().push(id));
        }

        preview.update().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);

        preview.update().unwrap();
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();
        assert!(preview.preview_file().exists());

        preview.delete().unwrap();
        assert!(!preview.preview_file().exists());
        preview.delete().unwrap();
    }

    #[test]
    fn test_delete_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview_path = {
            let preview = HtmlPreview::new(
                &source,
                PreviewOptions {
                    delete_on_exit: true,
                    ..Default::default()
                },
            )
            .unwrap();
            let path = preview.preview_file().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!preview_path.exists());
    }

    #[test]
    fn test_sessions_clean_up_independently() {
        let dir = tempfile::tempdir().unwrap();
        let source_a = write_source(&dir, "a.md", "a");
        let source_b = write_source(&dir, "b.md", "b");
        let options = PreviewOptions {
            delete_on_exit: true,
            ..Default::default()
        };

        let preview_a = HtmlPreview::new(&source_a, options.clone()).unwrap();
        let preview_b = HtmlPreview::new(&source_b, options).unwrap();
        let path_a = preview_a.preview_file().to_path_buf();
        let path_b = preview_b.preview_file().to_path_buf();

        drop(preview_a);
        assert!(!path_a.exists());
        assert!(path_b.exists());
        drop(preview_b);
        assert!(!path_b.exists());
    }

    #[test]
    fn test_concurrent_updates_leave_one_complete_render() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## heading\n\nsome *content* here");
        let preview = Arc::new(HtmlPreview::new(&source, PreviewOptions::default()).unwrap());

        let mut workers = Vec::new();
        for _ in 0..4 {
            let preview = Arc::clone(&preview);
            workers.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    preview.update().unwrap();
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        let html = read(preview.preview_file());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
        assert_eq!(html.matches("<!DOCTYPE html>").count(), 1);
    }

    #[test]
    fn test_watch_with_fake_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();

        let updates = Arc::new(AtomicUsize::new(0));
        {
            let updates = Arc::clone(&updates);
            preview.on_update(move || {
                updates.fetch_add(1, Ordering::SeqCst);
            });
        }

        let (tx, rx) = mpsc::sync_channel(1);
        preview.watch_with(FileWatcher::from_source(rx));

        std::fs::write(&source, "## foo bar").unwrap();
        tx.send(WatchEvent::Modified(source.clone())).unwrap();
        wait_for(|| updates.load(Ordering::SeqCst) >= 1);
        assert!(read(preview.preview_file()).contains("foo bar</h2>"));

        preview.end_watch();
        preview.end_watch();
        // After cancellation further events must not trigger updates.
        let _ = tx.send(WatchEvent::Modified(source.clone()));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watch_source_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = HtmlPreview::new(&source, PreviewOptions::default()).unwrap();

        let updated = Arc::new(AtomicUsize::new(0));
        {
            let updated = Arc::clone(&updated);
            preview.on_update(move || {
                updated.fetch_add(1, Ordering::SeqCst);
            });
        }

        preview.watch().unwrap();
        // A second watch while active is a no-op.
        preview.watch().unwrap();

        std::thread::sleep(Duration::from_millis(200));
        std::fs::write(&source, "## foo bar").unwrap();
        wait_for(|| updated.load(Ordering::SeqCst) >= 1);

        preview.end_watch();
        assert!(read(preview.preview_file()).contains("foo bar</h2>"));
    }

    #[test]
    fn test_watch_blocking_returns_when_source_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "test.md", "## foo");
        let preview = Arc::new(HtmlPreview::new(&source, PreviewOptions::default()).unwrap());

        let blocked = {
            let preview = Arc::clone(&preview);
            std::thread::spawn(move || preview.watch_blocking())
        };

        std::thread::sleep(Duration::from_millis(200));
        std::fs::remove_file(&source).unwrap();

        blocked.join().unwrap().unwrap();
    }
}
