//! pnpm workspace manifest support.
//!
//! Reads the `packages:` list from `pnpm-workspace.yaml` with a small
//! line-oriented parser and expands its globs into member package names.
//! Only a flat list of quoted or unquoted glob strings is understood; this
//! is deliberately not a YAML parser.

use crate::glob::{compile_all, find_matching_directories};
use crate::manifest::read_package_name;
use import_prompter_util::fs::read_to_string_lossy;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the workspace manifest.
pub const WORKSPACE_MANIFEST: &str = "pnpm-workspace.yaml";

/// Top-level key holding the member globs.
const PACKAGES_KEY: &str = "packages:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    SeekingPackagesKey,
    CollectingEntries,
    Done,
}

/// Extract the entries of the top-level `packages:` list.
///
/// A line starting with `packages:` enters list mode. In list mode, lines
/// starting with `-` contribute their trimmed, quote-stripped value; blank
/// lines and `#` comments are skipped; any other line ends the list.
/// A manifest without the key yields an empty list.
#[must_use]
pub fn parse_packages(content: &str) -> Vec<String> {
    let mut state = ParseState::SeekingPackagesKey;
    let mut entries = Vec::new();

    for line in content.lines() {
        match state {
            ParseState::SeekingPackagesKey => {
                if line.trim_end().starts_with(PACKAGES_KEY) {
                    state = ParseState::CollectingEntries;
                }
            }
            ParseState::CollectingEntries => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if let Some(rest) = trimmed.strip_prefix('-') {
                    let entry = strip_quotes(rest.trim());
                    if !entry.is_empty() {
                        entries.push(entry.to_string());
                    }
                } else {
                    state = ParseState::Done;
                }
            }
            ParseState::Done => break,
        }
    }

    entries
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

/// Normalize an entry to the relative form the matcher sees: no leading `./`, no trailing `/`.
fn normalize_entry(entry: &str) -> &str {
    let entry = entry.strip_prefix("./").unwrap_or(entry);
    entry.strip_suffix('/').unwrap_or(entry)
}

/// Read a workspace manifest and collect the names of its member packages.
///
/// Globs are expanded relative to the manifest's directory. The result is
/// sorted and deduplicated; members without a named `package.json` are
/// skipped. An unreadable manifest yields an empty list.
#[must_use]
pub fn collect_member_names(manifest_path: &Path, visit_budget: usize) -> Vec<String> {
    let content = match read_to_string_lossy(manifest_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %manifest_path.display(), error = %e, "Failed to read workspace manifest");
            return Vec::new();
        }
    };

    let entries = parse_packages(&content);
    let patterns: Vec<&str> = entries.iter().map(|e| normalize_entry(e)).collect();
    let globs = compile_all(&patterns);

    let Some(root) = manifest_path.parent() else {
        return Vec::new();
    };

    let dirs = find_matching_directories(root, &globs, visit_budget);
    let names: BTreeSet<String> = dirs
        .iter()
        .filter_map(|rel| read_package_name(&root.join(rel)))
        .collect();

    debug!(
        path = %manifest_path.display(),
        patterns = entries.len(),
        members = names.len(),
        "Expanded workspace manifest"
    );

    names.into_iter().collect()
}
