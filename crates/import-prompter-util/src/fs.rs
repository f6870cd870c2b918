use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Walk up from `start` looking for a file named `file_name`.
///
/// `start` itself is checked first, then each ancestor. Returns the full path
/// of the first match, or `None` once the filesystem root has been checked.
#[must_use]
pub fn find_up(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Turn `path` into an absolute, lexically clean path suitable as a cache key.
///
/// Existing paths are canonicalized (symlinks resolved, no `\\?\` prefix on
/// Windows). For paths that do not exist, the nearest existing ancestor is
/// canonicalized and the remaining components are appended with `.`/`..`
/// folded away, so a missing file and its existing siblings share a prefix.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }

    let Some(existing) = out.ancestors().skip(1).find(|a| a.exists()) else {
        return out;
    };
    match (dunce::canonicalize(existing), out.strip_prefix(existing)) {
        (Ok(base), Ok(rest)) => base.join(rest),
        _ => out,
    }
}

/// Render a relative path with `/` separators regardless of platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
