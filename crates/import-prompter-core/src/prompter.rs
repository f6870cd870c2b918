//! Candidate list assembly for import suggestions.
//!
//! [`ImportPrompter`] is what an editor integration talks to: it asks the
//! [`Host`] for the active file and the open folder, gathers dependency
//! names from the relevant manifests and the pnpm workspace, and returns one
//! sorted list.

use crate::cache::{CacheOptions, CacheStats, DependencyCache};
use crate::config::Config;
use crate::glob::{compile_all, GlobPattern};
use crate::manifest::MANIFEST_FILE;
use crate::watch::FileWatcher;
use import_prompter_util::fs::normalize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tracing::debug;

/// The editor-side environment.
pub trait Host: Send + Sync {
    /// Path of the file being edited, if any.
    fn active_file(&self) -> Option<PathBuf>;

    /// Root of the primary open folder, if any.
    fn workspace_root(&self) -> Option<PathBuf>;
}

/// Host with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    pub active_file: Option<PathBuf>,
    pub workspace_root: Option<PathBuf>,
}

impl StaticHost {
    #[must_use]
    pub fn new(active_file: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            active_file: Some(active_file.into()),
            workspace_root: Some(workspace_root.into()),
        }
    }
}

impl Host for StaticHost {
    fn active_file(&self) -> Option<PathBuf> {
        self.active_file.clone()
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.clone()
    }
}

/// Resolves import candidates for the host's active file.
#[derive(Debug)]
pub struct ImportPrompter<H> {
    host: H,
    config: RwLock<Config>,
    exclude: RwLock<Vec<GlobPattern>>,
    cache: DependencyCache,
}

impl<H: Host> ImportPrompter<H> {
    /// Create a prompter with empty caches.
    #[must_use]
    pub fn new(host: H, config: Config, watcher: Arc<dyn FileWatcher>, runtime: Handle) -> Self {
        let cache = DependencyCache::new(watcher, runtime, CacheOptions::from(&config));
        let exclude = compile_all(&config.exclude_packages);
        Self {
            host,
            config: RwLock::new(config),
            exclude: RwLock::new(exclude),
            cache,
        }
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn config(&self) -> Config {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration.
    ///
    /// All caches are cleared, since cached names may have been computed
    /// under the old peer-dependency policy.
    pub fn update_config(&self, config: Config) {
        *self.exclude.write().unwrap() = compile_all(&config.exclude_packages);
        self.cache.set_options(CacheOptions::from(&config));
        *self.config.write().unwrap() = config;
        self.cache.clear_all();
    }

    /// Collect the candidate package names.
    ///
    /// Returns `None` when the active file is outside any project or the
    /// host has no open folder. An empty list is a valid answer.
    pub fn get_scripts(&self) -> Option<Vec<String>> {
        let active = self.host.active_file()?;
        let current_root = self.cache.resolve_root(&active)?;
        let workspace_root = normalize(&self.host.workspace_root()?);

        let mut names: BTreeSet<String> = self
            .cache
            .names_for_manifest(&current_root.join(MANIFEST_FILE))
            .into_iter()
            .collect();

        if current_root != workspace_root {
            names.extend(
                self.cache
                    .names_for_manifest(&workspace_root.join(MANIFEST_FILE)),
            );
        }

        if let Some(members) = self.cache.workspace_package_names(&workspace_root) {
            names.extend(members);
        }

        let exclude = self.exclude.read().unwrap();
        let names: Vec<String> = names
            .into_iter()
            .filter(|name| !exclude.iter().any(|glob| glob.is_match(name)))
            .collect();

        debug!(
            root = %current_root.display(),
            workspace = %workspace_root.display(),
            count = names.len(),
            "Collected import candidates"
        );

        Some(names)
    }

    /// Candidates for a completion request, or `None` when none should be offered.
    ///
    /// Applies the language gate and the trigger check before looking up names.
    pub fn suggestions_for(&self, language_id: &str, line_text: &str) -> Option<Vec<String>> {
        {
            let config = self.config.read().unwrap();
            if !config.supports_language(language_id) || !config.matches_trigger(line_text) {
                return None;
            }
        }
        self.get_scripts()
    }

    /// Drop every cached result and watch.
    pub fn clear_all_caches(&self) {
        self.cache.clear_all();
    }

    #[must_use]
    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::NoWatcher;
    use std::fs;
    use tempfile::tempdir;

    fn prompter(host: StaticHost, config: Config) -> ImportPrompter<StaticHost> {
        ImportPrompter::new(host, config, Arc::new(NoWatcher), Handle::current())
    }

    #[tokio::test]
    async fn test_absent_without_active_file_or_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        let no_file = StaticHost {
            active_file: None,
            workspace_root: Some(dir.path().to_path_buf()),
        };
        assert!(prompter(no_file, Config::default()).get_scripts().is_none());

        let no_root = StaticHost {
            active_file: Some(dir.path().join("index.ts")),
            workspace_root: None,
        };
        assert!(prompter(no_root, Config::default()).get_scripts().is_none());
    }

    #[tokio::test]
    async fn test_exclude_packages() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"lodash": "^4", "@types/node": "^20", "@types/react": "^18"}}"#,
        )
        .unwrap();

        let host = StaticHost::new(dir.path().join("index.ts"), dir.path());
        let config = Config::default().with_exclude_packages(vec!["@types/*".to_string()]);
        assert_eq!(
            prompter(host, config).get_scripts(),
            Some(vec!["lodash".to_string()])
        );
    }

    #[tokio::test]
    async fn test_everything_excluded_is_empty_not_absent() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"lodash": "^4"}}"#,
        )
        .unwrap();

        let host = StaticHost::new(dir.path().join("index.ts"), dir.path());
        let config = Config::default().with_exclude_packages(vec!["**".to_string()]);
        assert_eq!(prompter(host, config).get_scripts(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_suggestions_gate_on_language_and_trigger() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"lodash": "^4"}}"#,
        )
        .unwrap();

        let host = StaticHost::new(dir.path().join("index.ts"), dir.path());
        let prompter = prompter(host, Config::default());

        assert!(prompter.suggestions_for("rust", "_").is_none());
        assert!(prompter.suggestions_for("typescript", "const x").is_none());
        assert_eq!(
            prompter.suggestions_for("typescript", "_imp"),
            Some(vec!["lodash".to_string()])
        );
    }

    #[tokio::test]
    async fn test_update_config_clears_and_applies_policy() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"lodash": "^4"}, "peerDependencies": {"react": "^18"}}"#,
        )
        .unwrap();

        let host = StaticHost::new(dir.path().join("index.ts"), dir.path());
        let prompter = prompter(host, Config::default());
        assert_eq!(
            prompter.get_scripts(),
            Some(vec!["lodash".to_string(), "react".to_string()])
        );

        prompter.update_config(Config::default().with_peer_dependencies(false));
        assert_eq!(prompter.get_scripts(), Some(vec!["lodash".to_string()]));
        assert_eq!(prompter.stats().manifest_reads, 2);
        assert!(!prompter.config().include_peer_dependencies);
    }
}
