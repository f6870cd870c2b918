//! File watching for cache invalidation.
//!
//! [`FileWatcher`] is the seam between the caches and whatever delivers
//! change notifications. [`NotifyWatcher`] backs it with the `notify` crate;
//! [`NoWatcher`] never fires and suits one-shot lookups.

use notify::{
    event::{ModifyKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A change to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    /// The file was created, written, or renamed into place.
    Changed,
    /// The file was removed or renamed away.
    Deleted,
}

/// Callback invoked for every raw event on a watched path.
pub type FileEventHandler = Arc<dyn Fn(FileEvent) + Send + Sync>;

/// A live subscription. Stopping (or dropping) it ends delivery.
pub struct WatchHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    /// Create a handle that runs `stop` exactly once.
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// A handle with nothing to release.
    #[must_use]
    pub fn noop() -> Self {
        Self { stop: None }
    }

    /// Stop watching.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.stop.is_some())
            .finish()
    }
}

/// Something that can watch individual files.
///
/// Implementations deliver raw events; coalescing is the caller's job.
pub trait FileWatcher: Send + Sync + std::fmt::Debug {
    /// Start delivering events for `path` to `handler`.
    fn watch(&self, path: &Path, handler: FileEventHandler) -> Result<WatchHandle, WatchError>;
}

/// Watcher that never delivers events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWatcher;

impl FileWatcher for NoWatcher {
    fn watch(&self, _path: &Path, _handler: FileEventHandler) -> Result<WatchHandle, WatchError> {
        Ok(WatchHandle::noop())
    }
}

type Subscribers = HashMap<PathBuf, Vec<(u64, FileEventHandler)>>;

/// `notify`-backed watcher.
///
/// Files are watched through their parent directory (non-recursive) so that
/// deletes and atomic replace-by-rename are seen. Each directory is watched
/// once no matter how many files in it are subscribed. Raw notify events are
/// forwarded over a channel to a task on the given runtime, which dispatches
/// them to subscribers; handlers therefore never run on notify's own thread.
pub struct NotifyWatcher {
    inner: Arc<NotifyInner>,
}

struct NotifyInner {
    watcher: Mutex<RecommendedWatcher>,
    subscribers: Arc<Mutex<Subscribers>>,
    /// Watched directory -> number of subscribed files in it.
    dirs: Mutex<HashMap<PathBuf, usize>>,
    next_id: AtomicU64,
}

impl NotifyWatcher {
    /// Create a watcher whose dispatch task runs on `runtime`.
    pub fn new(runtime: &Handle) -> Result<Self, WatchError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(e) = tx.send(event) {
                        warn!(error = %e, "Failed to forward watch event");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Watch error");
                }
            },
            Config::default(),
        )
        .map_err(|e| WatchError::WatcherFailed(e.to_string()))?;

        let subscribers: Arc<Mutex<Subscribers>> = Arc::default();
        let dispatch_to = Arc::downgrade(&subscribers);
        runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(subscribers) = dispatch_to.upgrade() else {
                    break;
                };
                dispatch(&subscribers, &event);
            }
            debug!("Watch event channel closed");
        });

        Ok(Self {
            inner: Arc::new(NotifyInner {
                watcher: Mutex::new(watcher),
                subscribers,
                dirs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Number of directories currently watched.
    #[must_use]
    pub fn watched_dirs(&self) -> usize {
        self.inner.dirs.lock().unwrap().len()
    }
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("watched_dirs", &self.watched_dirs())
            .finish_non_exhaustive()
    }
}

impl FileWatcher for NotifyWatcher {
    fn watch(&self, path: &Path, handler: FileEventHandler) -> Result<WatchHandle, WatchError> {
        let dir = path
            .parent()
            .filter(|d| d.is_dir())
            .ok_or_else(|| WatchError::InvalidPath(path.display().to_string()))?
            .to_path_buf();

        {
            let mut dirs = self.inner.dirs.lock().unwrap();
            let count = dirs.entry(dir.clone()).or_insert(0);
            if *count == 0 {
                if let Err(e) = self
                    .inner
                    .watcher
                    .lock()
                    .unwrap()
                    .watch(&dir, RecursiveMode::NonRecursive)
                {
                    dirs.remove(&dir);
                    return Err(WatchError::WatcherFailed(e.to_string()));
                }
                debug!(dir = %dir.display(), "Watching directory");
            }
            *count += 1;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .push((id, handler));

        let inner = Arc::downgrade(&self.inner);
        let path = path.to_path_buf();
        Ok(WatchHandle::new(move || unsubscribe(&inner, &path, &dir, id)))
    }
}

fn unsubscribe(inner: &Weak<NotifyInner>, path: &Path, dir: &Path, id: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };

    {
        let mut subscribers = inner.subscribers.lock().unwrap();
        if let Some(handlers) = subscribers.get_mut(path) {
            handlers.retain(|(h, _)| *h != id);
            if handlers.is_empty() {
                subscribers.remove(path);
            }
        }
    }

    let mut dirs = inner.dirs.lock().unwrap();
    if let Some(count) = dirs.get_mut(dir) {
        *count -= 1;
        if *count == 0 {
            dirs.remove(dir);
            let _ = inner.watcher.lock().unwrap().unwatch(dir);
            debug!(dir = %dir.display(), "Removed directory from watcher");
        }
    }
}

/// Deliver one notify event to the handlers subscribed to its paths.
fn dispatch(subscribers: &Mutex<Subscribers>, event: &Event) {
    for (path, file_event) in classify(event) {
        // Clone out so handlers may unsubscribe without deadlocking.
        let handlers: Vec<FileEventHandler> = {
            let subscribers = subscribers.lock().unwrap();
            subscribers
                .get(path)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        for handler in handlers {
            handler(file_event);
        }
    }
}

/// Map a notify event onto per-path [`FileEvent`]s.
fn classify(event: &Event) -> Vec<(&PathBuf, FileEvent)> {
    match &event.kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| (p, FileEvent::Deleted))
            .collect(),
        // Both: paths are [from, to].
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let kind = if i == 0 {
                    FileEvent::Deleted
                } else {
                    FileEvent::Changed
                };
                (p, kind)
            })
            .collect(),
        EventKind::Create(_)
        | EventKind::Modify(
            ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any | ModifyKind::Other,
        ) => event
            .paths
            .iter()
            .map(|p| (p, FileEvent::Changed))
            .collect(),
        // Access, metadata-only changes and the rest
        _ => Vec::new(),
    }
}

/// Watcher error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    InvalidPath(String),
    WatcherFailed(String),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "Cannot watch path: {path}"),
            Self::WatcherFailed(msg) => write!(f, "Watcher failed: {msg}"),
        }
    }
}

impl std::error::Error for WatchError {}

#[cfg(test)]
mod tests {
    use super::*;
    use import_prompter_util::fs::normalize;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_classify_events() {
        let created = event(EventKind::Create(CreateKind::File), &["/a/package.json"]);
        assert_eq!(classify(&created)[0].1, FileEvent::Changed);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/a/package.json"],
        );
        assert_eq!(classify(&written)[0].1, FileEvent::Changed);

        let removed = event(EventKind::Remove(RemoveKind::File), &["/a/package.json"]);
        assert_eq!(classify(&removed)[0].1, FileEvent::Deleted);

        let touched = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
            &["/a/package.json"],
        );
        assert!(classify(&touched).is_empty());
    }

    #[test]
    fn test_classify_rename_both() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/a/package.json", "/a/package.json.bak"],
        );
        let classified = classify(&renamed);
        assert_eq!(classified[0], (&PathBuf::from("/a/package.json"), FileEvent::Deleted));
        assert_eq!(
            classified[1],
            (&PathBuf::from("/a/package.json.bak"), FileEvent::Changed)
        );
    }

    #[test]
    fn test_dispatch_only_reaches_subscribed_path() {
        let hits = Arc::new(AtomicUsize::new(0));
        let subscribers: Mutex<Subscribers> = Mutex::default();
        {
            let hits = hits.clone();
            let handler: FileEventHandler = Arc::new(move |_: FileEvent| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            subscribers
                .lock()
                .unwrap()
                .insert(PathBuf::from("/a/package.json"), vec![(1, handler)]);
        }

        let other = event(EventKind::Create(CreateKind::File), &["/a/other.json"]);
        dispatch(&subscribers, &other);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let ours = event(EventKind::Create(CreateKind::File), &["/a/package.json"]);
        dispatch(&subscribers, &ours);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watch_handle_stops_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let handle = {
            let stops = stops.clone();
            WatchHandle::new(move || {
                stops.fetch_add(1, Ordering::SeqCst);
            })
        };
        handle.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        {
            let stops = stops.clone();
            let _dropped = WatchHandle::new(move || {
                stops.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_watcher() {
        let handler: FileEventHandler = Arc::new(|_: FileEvent| {});
        let handle = NoWatcher.watch(Path::new("/nowhere/package.json"), handler);
        assert!(handle.is_ok());
    }

    #[tokio::test]
    async fn test_notify_watcher_refcounts_directories() {
        let dir = tempdir().unwrap();
        let root = normalize(dir.path());
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("pnpm-workspace.yaml"), "packages:\n").unwrap();

        let watcher = NotifyWatcher::new(&Handle::current()).unwrap();
        let handler: FileEventHandler = Arc::new(|_: FileEvent| {});
        let a = watcher
            .watch(&root.join("package.json"), handler.clone())
            .unwrap();
        let b = watcher
            .watch(&root.join("pnpm-workspace.yaml"), handler)
            .unwrap();
        assert_eq!(watcher.watched_dirs(), 1);

        a.stop();
        assert_eq!(watcher.watched_dirs(), 1);
        b.stop();
        assert_eq!(watcher.watched_dirs(), 0);
    }

    #[test]
    fn test_notify_watcher_rejects_missing_directory() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let dir = tempdir().unwrap();
        let watcher = NotifyWatcher::new(runtime.handle()).unwrap();
        let handler: FileEventHandler = Arc::new(|_: FileEvent| {});

        let err = watcher
            .watch(&dir.path().join("missing").join("package.json"), handler)
            .unwrap_err();
        assert!(matches!(err, WatchError::InvalidPath(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_notify_watcher_reports_deletion() {
        let dir = tempdir().unwrap();
        let root = normalize(dir.path());
        let manifest = root.join("package.json");
        fs::write(&manifest, "{}").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = NotifyWatcher::new(&Handle::current()).unwrap();
        let handler: FileEventHandler = Arc::new(move |e: FileEvent| {
            let _ = tx.send(e);
        });
        let _handle = watcher.watch(&manifest, handler).unwrap();

        fs::remove_file(&manifest).unwrap();

        let deleted = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(event) = rx.recv().await {
                if event == FileEvent::Deleted {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(deleted);
    }
}
