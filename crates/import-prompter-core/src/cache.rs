//! Dependency-name caches with file-watch invalidation.
//!
//! One [`DependencyCache`] owns every cache the engine keeps: manifest name
//! sets, workspace member lists, project-root lookups and the located
//! workspace manifest. Entries are keyed by absolute path. Each cached file
//! gets exactly one watch; changes are debounced and either recompute the
//! entry (manifests) or drop it (workspace lists), and deletion drops the
//! entry together with its watch.

use crate::config::{Config, DEFAULT_DEBOUNCE_MS, DEFAULT_VISIT_BUDGET};
use crate::debounce::Debouncer;
use crate::manifest::{extract_names, read_manifest, DependencyPolicy};
use crate::watch::{FileEvent, FileEventHandler, FileWatcher, WatchHandle};
use crate::workspace::{collect_member_names, WORKSPACE_MANIFEST};
use import_prompter_util::fs::{find_up, normalize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Tuning knobs for the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Quiet period before a changed file is acted on.
    pub debounce: Duration,
    /// Directory visit budget for workspace glob expansion.
    pub visit_budget: usize,
    /// Which dependency sections cached manifest names cover.
    pub policy: DependencyPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            visit_budget: DEFAULT_VISIT_BUDGET,
            policy: DependencyPolicy::default(),
        }
    }
}

impl From<&Config> for CacheOptions {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            visit_budget: config.visit_budget,
            policy: DependencyPolicy {
                include_peer_dependencies: config.include_peer_dependencies,
            },
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub manifest_entries: usize,
    pub workspace_entries: usize,
    pub root_entries: usize,
    pub watch_count: usize,
    /// Manifest reads performed since creation (never reset).
    pub manifest_reads: u64,
    /// Upward root searches performed since creation (never reset).
    pub root_searches: u64,
    /// Workspace manifest expansions performed since creation (never reset).
    pub workspace_parses: u64,
}

/// What a watched file feeds.
#[derive(Debug, Clone, Copy)]
enum WatchKind {
    Manifest,
    Workspace,
}

struct WatchRegistration {
    id: u64,
    handle: WatchHandle,
    debouncer: Arc<Debouncer>,
}

impl WatchRegistration {
    fn release(self) {
        self.debouncer.cancel();
        self.handle.stop();
    }
}

/// Dependency caches shared by the resolvers.
#[derive(Debug)]
pub struct DependencyCache {
    inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    watcher: Arc<dyn FileWatcher>,
    runtime: Handle,
    options: RwLock<CacheOptions>,

    /// Manifest path -> sorted dependency names.
    manifests: RwLock<HashMap<PathBuf, Vec<String>>>,
    /// Workspace manifest path -> sorted member names.
    workspace_names: RwLock<HashMap<PathBuf, Vec<String>>>,
    /// Origin file -> project root.
    pub(crate) roots: RwLock<HashMap<PathBuf, PathBuf>>,
    /// Most recently discovered project root.
    pub(crate) last_root: RwLock<Option<PathBuf>>,
    /// Located workspace manifest, memoized once found.
    workspace_manifest: RwLock<Option<PathBuf>>,

    watches: Mutex<HashMap<PathBuf, WatchRegistration>>,
    next_watch_id: AtomicU64,

    manifest_reads: AtomicU64,
    pub(crate) root_searches: AtomicU64,
    workspace_parses: AtomicU64,
}

impl std::fmt::Debug for CacheInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInner")
            .field("watcher", &self.watcher)
            .field("options", &self.options)
            .field("watches", &self.watches.lock().unwrap().len())
            .finish_non_exhaustive()
    }
}

impl DependencyCache {
    /// Create an empty cache.
    ///
    /// Debounce timers run as tasks on `runtime`.
    #[must_use]
    pub fn new(watcher: Arc<dyn FileWatcher>, runtime: Handle, options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                watcher,
                runtime,
                options: RwLock::new(options),
                manifests: RwLock::default(),
                workspace_names: RwLock::default(),
                roots: RwLock::default(),
                last_root: RwLock::default(),
                workspace_manifest: RwLock::default(),
                watches: Mutex::default(),
                next_watch_id: AtomicU64::new(1),
                manifest_reads: AtomicU64::new(0),
                root_searches: AtomicU64::new(0),
                workspace_parses: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &CacheInner {
        &self.inner
    }

    /// Replace the tuning options. Existing watches keep their old debounce.
    ///
    /// A new dependency policy invalidates every cached name list, so the
    /// caches are cleared when it changes.
    pub fn set_options(&self, options: CacheOptions) {
        let previous = std::mem::replace(&mut *self.inner.options.write().unwrap(), options);
        if previous.policy != options.policy {
            self.clear_all();
        }
    }

    #[must_use]
    pub fn options(&self) -> CacheOptions {
        *self.inner.options.read().unwrap()
    }

    /// Dependency names declared by the manifest at `manifest_path`, under
    /// the policy in the cache options.
    ///
    /// The first access reads the file, caches the names and starts watching
    /// it; later accesses are served from the cache. A missing file yields
    /// an empty list and is not cached.
    pub fn names_for_manifest(&self, manifest_path: &Path) -> Vec<String> {
        let path = normalize(manifest_path);

        if let Some(names) = self.inner.manifests.read().unwrap().get(&path) {
            debug!(path = %path.display(), "Manifest cache hit");
            return names.clone();
        }

        if !path.is_file() {
            return Vec::new();
        }

        let names = self.inner.load_manifest_names(&path);
        self.inner
            .manifests
            .write()
            .unwrap()
            .insert(path.clone(), names.clone());
        self.inner.ensure_watch(&path, WatchKind::Manifest);

        names
    }

    /// Names of the packages in the pnpm workspace enclosing `root`.
    ///
    /// Returns `None` when no workspace manifest exists at or above `root`,
    /// and `Some` (possibly empty) otherwise.
    pub fn workspace_package_names(&self, root: &Path) -> Option<Vec<String>> {
        let manifest = self.locate_workspace_manifest(root)?;

        if let Some(names) = self.inner.workspace_names.read().unwrap().get(&manifest) {
            debug!(path = %manifest.display(), "Workspace cache hit");
            return Some(names.clone());
        }

        self.inner.workspace_parses.fetch_add(1, Ordering::Relaxed);
        let visit_budget = self.options().visit_budget;
        let names = collect_member_names(&manifest, visit_budget);
        self.inner
            .workspace_names
            .write()
            .unwrap()
            .insert(manifest.clone(), names.clone());
        self.inner.ensure_watch(&manifest, WatchKind::Workspace);

        Some(names)
    }

    /// Find the workspace manifest, searching upward from `root` until one is found.
    fn locate_workspace_manifest(&self, root: &Path) -> Option<PathBuf> {
        if let Some(found) = self.inner.workspace_manifest.read().unwrap().as_ref() {
            return Some(found.clone());
        }

        let found = find_up(&normalize(root), WORKSPACE_MANIFEST)?;
        debug!(path = %found.display(), "Located workspace manifest");
        *self.inner.workspace_manifest.write().unwrap() = Some(found.clone());
        Some(found)
    }

    /// Empty every cache and release every watch.
    ///
    /// Pending debounced recomputations are cancelled first, and any that
    /// already started are ignored because their registration is gone.
    pub fn clear_all(&self) {
        let registrations = std::mem::take(&mut *self.inner.watches.lock().unwrap());

        self.inner.manifests.write().unwrap().clear();
        self.inner.workspace_names.write().unwrap().clear();
        self.inner.roots.write().unwrap().clear();
        *self.inner.last_root.write().unwrap() = None;
        *self.inner.workspace_manifest.write().unwrap() = None;

        let count = registrations.len();
        for registration in registrations.into_values() {
            registration.release();
        }

        debug!(watches = count, "Cleared dependency caches");
    }

    /// Whether `path` currently has a live watch.
    #[must_use]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.inner
            .watches
            .lock()
            .unwrap()
            .contains_key(&normalize(path))
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        // One lock at a time: a recompute holds `watches` while writing a map.
        let manifest_entries = self.inner.manifests.read().unwrap().len();
        let workspace_entries = self.inner.workspace_names.read().unwrap().len();
        let root_entries = self.inner.roots.read().unwrap().len();
        let watch_count = self.inner.watches.lock().unwrap().len();

        CacheStats {
            manifest_entries,
            workspace_entries,
            root_entries,
            watch_count,
            manifest_reads: self.inner.manifest_reads.load(Ordering::Relaxed),
            root_searches: self.inner.root_searches.load(Ordering::Relaxed),
            workspace_parses: self.inner.workspace_parses.load(Ordering::Relaxed),
        }
    }
}

impl CacheInner {
    fn load_manifest_names(&self, path: &Path) -> Vec<String> {
        let policy = self.options.read().unwrap().policy;
        self.manifest_reads.fetch_add(1, Ordering::Relaxed);
        extract_names(read_manifest(path).as_ref(), policy)
    }

    /// Register the single watch for `path`, unless one is already live.
    fn ensure_watch(self: &Arc<Self>, path: &Path, kind: WatchKind) {
        if self.watches.lock().unwrap().contains_key(path) {
            return;
        }

        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let debounce = self.options.read().unwrap().debounce;
        let debouncer = Arc::new(Debouncer::new(debounce, self.runtime.clone()));
        let handler = self.event_handler(path, kind, id, Arc::clone(&debouncer));

        let handle = match self.watcher.watch(path, handler) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to watch file");
                return;
            }
        };

        match self.watches.lock().unwrap().entry(path.to_path_buf()) {
            Entry::Occupied(_) => {
                // Lost a registration race; keep the existing watch.
                drop(handle);
            }
            Entry::Vacant(slot) => {
                debug!(path = %path.display(), "Watching file");
                slot.insert(WatchRegistration {
                    id,
                    handle,
                    debouncer,
                });
            }
        }
    }

    fn event_handler(
        self: &Arc<Self>,
        path: &Path,
        kind: WatchKind,
        id: u64,
        debouncer: Arc<Debouncer>,
    ) -> FileEventHandler {
        let cache: Weak<Self> = Arc::downgrade(self);
        let path = path.to_path_buf();

        Arc::new(move |event: FileEvent| match event {
            FileEvent::Changed => {
                let cache = cache.clone();
                let path = path.clone();
                debouncer.schedule(move || {
                    if let Some(cache) = cache.upgrade() {
                        cache.apply_change(&path, kind, id);
                    }
                });
            }
            FileEvent::Deleted => {
                if let Some(cache) = cache.upgrade() {
                    cache.apply_delete(&path, kind, id);
                }
            }
        })
    }

    fn is_current(&self, path: &Path, id: u64) -> bool {
        self.watches
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|r| r.id == id)
    }

    fn apply_change(&self, path: &Path, kind: WatchKind, id: u64) {
        if !self.is_current(path, id) {
            debug!(path = %path.display(), "Ignoring change for released watch");
            return;
        }

        match kind {
            WatchKind::Manifest => {
                let names = self.load_manifest_names(path);
                let count = names.len();
                if self.store_manifest_names(path, id, names) {
                    debug!(path = %path.display(), count, "Manifest changed, names refreshed");
                }
            }
            WatchKind::Workspace => {
                let watches = self.watches.lock().unwrap();
                if watches.get(path).is_some_and(|r| r.id == id) {
                    debug!(path = %path.display(), "Workspace manifest changed, member list invalidated");
                    self.workspace_names.write().unwrap().remove(path);
                }
            }
        }
    }

    /// Store freshly read names if the registration `id` is still live.
    ///
    /// The `watches` lock is held across the check and the write, so a clear
    /// or delete that lands during the read wins.
    fn store_manifest_names(&self, path: &Path, id: u64, names: Vec<String>) -> bool {
        let watches = self.watches.lock().unwrap();
        if !watches.get(path).is_some_and(|r| r.id == id) {
            debug!(path = %path.display(), "Discarding names read for a released watch");
            return false;
        }
        self.manifests
            .write()
            .unwrap()
            .insert(path.to_path_buf(), names);
        true
    }

    fn apply_delete(&self, path: &Path, kind: WatchKind, id: u64) {
        let registration = {
            let mut watches = self.watches.lock().unwrap();
            match watches.get(path) {
                Some(r) if r.id == id => watches.remove(path),
                _ => None,
            }
        };
        let Some(registration) = registration else {
            return;
        };

        match kind {
            WatchKind::Manifest => {
                self.manifests.write().unwrap().remove(path);
            }
            WatchKind::Workspace => {
                self.workspace_names.write().unwrap().remove(path);
                let mut located = self.workspace_manifest.write().unwrap();
                if located.as_deref() == Some(path) {
                    *located = None;
                }
            }
        }

        debug!(path = %path.display(), "Watched file deleted, entry dropped");
        registration.release();
    }
}
