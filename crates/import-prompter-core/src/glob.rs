//! Minimal glob matching for workspace patterns.
//!
//! Only `*` (any run of characters except `/`) and `**` (any characters,
//! including `/`) are wildcards. Every other character is literal, so
//! character classes, negation and brace expansion silently match only
//! their literal text.

use crate::error::Error;
use import_prompter_util::fs::to_slash;
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into while expanding patterns.
const SKIPPED_DIRS: [&str; 2] = ["node_modules", ".git"];

/// A compiled glob pattern matched against `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob into an anchored matcher.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let body = pattern
            .split("**")
            .map(translate_segment)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("^{body}$")).map_err(|e| Error::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Test a relative path (using `/` separators) against the pattern.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Translate a segment containing no `**`: escape literals, `*` becomes `[^/]*`.
fn translate_segment(segment: &str) -> String {
    segment
        .split('*')
        .map(regex_lite::escape)
        .collect::<Vec<_>>()
        .join("[^/]*")
}

/// Compile every pattern, dropping (and logging) any that fail.
#[must_use]
pub fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Vec<GlobPattern> {
    patterns
        .iter()
        .filter_map(|p| match GlobPattern::compile(p.as_ref()) {
            Ok(glob) => Some(glob),
            Err(e) => {
                debug!(error = %e, "Skipping glob pattern");
                None
            }
        })
        .collect()
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Walk `root` depth-first and collect relative directory paths matching any pattern.
///
/// Every visited directory (the root included) counts against
/// `visit_budget`; the walk stops once the count exceeds it, so very large
/// trees may yield partial results. Matched directories are still descended
/// into. Unreadable directories are skipped.
///
/// `node_modules` and `.git` are never entered, so nothing inside them can
/// match even when a pattern like `**` would cover it. Symlinked
/// directories are not followed.
#[must_use]
pub fn find_matching_directories(
    root: &Path,
    patterns: &[GlobPattern],
    visit_budget: usize,
) -> BTreeSet<String> {
    let mut matched = BTreeSet::new();
    if patterns.is_empty() {
        return matched;
    }

    let mut visited = 0usize;
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));

    for entry in walker {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        visited += 1;
        if visited > visit_budget {
            debug!(root = %root.display(), visit_budget, "Directory visit budget exhausted");
            break;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = to_slash(relative);
        if relative.is_empty() {
            continue;
        }

        if patterns.iter().any(|p| p.is_match(&relative)) {
            matched.insert(relative);
        }
    }

    matched
}
