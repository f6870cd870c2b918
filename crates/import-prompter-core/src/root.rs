//! Project root lookup for the active file.

use crate::cache::DependencyCache;
use crate::manifest::MANIFEST_FILE;
use import_prompter_util::fs::{find_up, normalize};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::debug;

impl DependencyCache {
    /// Find the nearest directory at or above `origin` that contains a `package.json`.
    ///
    /// Results are memoized per origin. When the most recently discovered
    /// root is an ancestor of `origin` (compared by path components, so
    /// `/work/app` is not an ancestor of `/work/app-2`), it is returned
    /// without searching. Returns `None` for files outside any project.
    pub fn resolve_root(&self, origin: &Path) -> Option<PathBuf> {
        let origin = normalize(origin);
        let inner = self.inner();

        if let Some(root) = inner.roots.read().unwrap().get(&origin) {
            return Some(root.clone());
        }

        if let Some(last) = inner.last_root.read().unwrap().as_ref() {
            if origin.starts_with(last) {
                debug!(origin = %origin.display(), root = %last.display(), "Reusing last project root");
                return Some(last.clone());
            }
        }

        inner.root_searches.fetch_add(1, Ordering::Relaxed);
        let manifest = find_up(&origin, MANIFEST_FILE)?;
        let root = manifest.parent()?.to_path_buf();
        debug!(origin = %origin.display(), root = %root.display(), "Found project root");

        inner
            .roots
            .write()
            .unwrap()
            .insert(origin, root.clone());
        *inner.last_root.write().unwrap() = Some(root.clone());

        Some(root)
    }
}
