#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::needless_pass_by_value)]

//! Dependency discovery for import suggestions.
//!
//! Finds the package names a source file can import by reading the
//! `package.json` of its project and of the open workspace, plus the member
//! packages of a pnpm workspace. Results are cached per file and kept fresh
//! by file watches.

pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod glob;
pub mod manifest;
pub mod prompter;
mod root;
pub mod watch;
pub mod workspace;

pub use cache::{CacheOptions, CacheStats, DependencyCache};
pub use config::Config;
pub use error::Error;
pub use manifest::{extract_names, read_manifest, DependencyPolicy, ManifestRecord};
pub use prompter::{Host, ImportPrompter, StaticHost};
pub use watch::{FileEvent, FileWatcher, NoWatcher, NotifyWatcher, WatchError, WatchHandle};

/// Version of import-prompter.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
