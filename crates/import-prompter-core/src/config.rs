//! User configuration: dependency policy, exclusions, completion gating
//! and engine tuning, loadable from a camelCase JSON settings file.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default quiet period before a changed manifest is re-read.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default number of directories visited while expanding workspace globs.
pub const DEFAULT_VISIT_BUDGET: usize = 5000;

/// Suffix appended to the trigger token to form the completion keyword.
const TRIGGER_WORD: &str = "import-prompter";

/// User-facing configuration for import-prompter.
///
/// Keys use the same camelCase names as the editor settings so a settings
/// fragment can be loaded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Whether `peerDependencies` contribute candidate names.
    pub include_peer_dependencies: bool,

    /// Package names (or `*`/`**` globs) never offered as candidates.
    pub exclude_packages: Vec<String>,

    /// Character typed to start an import suggestion.
    pub trigger: String,

    /// Document language identifiers suggestions apply to.
    pub supported_languages: Vec<String>,

    /// Quiet period for coalescing manifest change events.
    pub debounce_ms: u64,

    /// Upper bound on directories visited during workspace glob expansion.
    pub visit_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_peer_dependencies: true,
            exclude_packages: Vec::new(),
            trigger: "_".to_string(),
            supported_languages: [
                "javascript",
                "javascriptreact",
                "typescript",
                "typescriptreact",
                "vue",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            visit_budget: DEFAULT_VISIT_BUDGET,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set whether peer dependencies are included.
    #[must_use]
    pub fn with_peer_dependencies(mut self, include: bool) -> Self {
        self.include_peer_dependencies = include;
        self
    }

    /// Set the excluded package patterns.
    #[must_use]
    pub fn with_exclude_packages(mut self, patterns: Vec<String>) -> Self {
        self.exclude_packages = patterns;
        self
    }

    /// Set the debounce window in milliseconds.
    #[must_use]
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the directory visit budget for workspace expansion.
    #[must_use]
    pub fn with_visit_budget(mut self, budget: usize) -> Self {
        self.visit_budget = budget;
        self
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Check whether suggestions apply to a document language.
    #[must_use]
    pub fn supports_language(&self, language_id: &str) -> bool {
        self.supported_languages.iter().any(|l| l == language_id)
    }

    /// The keyword a completion is offered under, e.g. `_import-prompter`.
    #[must_use]
    pub fn trigger_word(&self) -> String {
        format!("{}{TRIGGER_WORD}", self.trigger)
    }

    /// Check whether the text typed so far on a line should offer the import completion.
    ///
    /// The line matches while it is a non-empty prefix of the trigger word.
    #[must_use]
    pub fn matches_trigger(&self, line_text: &str) -> bool {
        let line = line_text.trim_start();
        !line.is_empty() && self.trigger_word().starts_with(line)
    }
}
