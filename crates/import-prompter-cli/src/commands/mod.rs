pub mod suggest;
pub mod version;
pub mod watch;

use import_prompter_core::StaticHost;
use import_prompter_util::fs::normalize;
use serde::Serialize;
use std::path::Path;

/// Build the host for a file, resolving relative paths against `cwd`.
///
/// The workspace root defaults to `cwd`.
pub fn host_for(cwd: &Path, file: &Path, root: Option<&Path>) -> StaticHost {
    StaticHost::new(
        normalize(&cwd.join(file)),
        normalize(&root.map_or_else(|| cwd.to_path_buf(), |r| cwd.join(r))),
    )
}

/// Candidate list response for JSON output.
#[derive(Serialize)]
pub struct SuggestResult<'a> {
    pub ok: bool,
    /// False when the file is outside any project or the request was gated out.
    pub found: bool,
    pub packages: &'a [String],
}

/// Print a candidate list in text or JSON form.
pub fn print_packages(packages: Option<&[String]>, json: bool) {
    if json {
        let result = SuggestResult {
            ok: true,
            found: packages.is_some(),
            packages: packages.unwrap_or_default(),
        };
        println!("{}", serde_json::to_string(&result).unwrap_or_default());
        return;
    }

    match packages {
        None => {
            eprintln!("No project found for the active file.");
            eprintln!("hint: pass --root or open a file inside a directory with package.json");
        }
        Some([]) => println!("No packages."),
        Some(packages) => {
            for name in packages {
                println!("{name}");
            }
        }
    }
}
