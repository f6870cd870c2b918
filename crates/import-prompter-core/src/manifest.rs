//! Package.json reading and dependency-name extraction.
//!
//! Manifests are read with an explicit file read and JSON parse on every
//! call; nothing here caches. Sections with the wrong shape are ignored
//! rather than failing the whole manifest.

use crate::error::Error;
use import_prompter_util::fs::read_to_string_lossy;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// File name of a project manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// Dependency sections that always contribute names.
const ALWAYS_SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

/// Section that contributes names only when peers are enabled.
const PEER_SECTION: &str = "peerDependencies";

/// Parsed content of one `package.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestRecord {
    /// The `name` field, when present and a string.
    pub name: Option<String>,
    /// `dependencies`: name -> version spec.
    pub dependencies: Option<BTreeMap<String, Value>>,
    /// `devDependencies`: name -> version spec.
    pub dev_dependencies: Option<BTreeMap<String, Value>>,
    /// `peerDependencies`: name -> version spec.
    pub peer_dependencies: Option<BTreeMap<String, Value>>,
}

impl ManifestRecord {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = read_to_string_lossy(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_value(&value))
    }

    /// Build a record from an already-parsed JSON value.
    ///
    /// A non-object root yields an empty record.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            return Self::default();
        };

        Self {
            name: root.get("name").and_then(Value::as_str).map(String::from),
            dependencies: section(root, ALWAYS_SECTIONS[0]),
            dev_dependencies: section(root, ALWAYS_SECTIONS[1]),
            peer_dependencies: section(root, PEER_SECTION),
        }
    }
}

fn section(root: &Map<String, Value>, key: &str) -> Option<BTreeMap<String, Value>> {
    let obj = root.get(key)?.as_object()?;
    Some(obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Read a manifest, logging and returning `None` on any failure.
#[must_use]
pub fn read_manifest(path: &Path) -> Option<ManifestRecord> {
    match ManifestRecord::load(path) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read manifest");
            None
        }
    }
}

/// Read only the `name` field of the manifest in `dir`.
///
/// Missing or unreadable manifests are silently skipped; workspace
/// expansion routinely visits directories without one.
#[must_use]
pub fn read_package_name(dir: &Path) -> Option<String> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return None;
    }
    read_manifest(&path)?.name
}

/// Which dependency sections contribute names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyPolicy {
    pub include_peer_dependencies: bool,
}

impl Default for DependencyPolicy {
    fn default() -> Self {
        Self {
            include_peer_dependencies: true,
        }
    }
}

/// Collect the sorted, deduplicated dependency names a manifest declares.
#[must_use]
pub fn extract_names(record: Option<&ManifestRecord>, policy: DependencyPolicy) -> Vec<String> {
    let Some(record) = record else {
        return Vec::new();
    };

    let mut names = BTreeSet::new();
    let mut sections = vec![&record.dependencies, &record.dev_dependencies];
    if policy.include_peer_dependencies {
        sections.push(&record.peer_dependencies);
    }

    for map in sections.into_iter().flatten() {
        names.extend(map.keys().cloned());
    }

    names.into_iter().collect()
}
