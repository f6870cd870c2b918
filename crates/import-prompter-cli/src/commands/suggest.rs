//! `import-prompter suggest` command implementation.
//!
//! One-shot lookup: no file watching.

use super::{host_for, print_packages};
use import_prompter_core::{Config, ImportPrompter, NoWatcher};
use miette::{IntoDiagnostic, Result};
use std::path::Path;
use std::sync::Arc;

/// Editor context used to gate suggestions.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    pub language: String,
    pub line: String,
}

/// Run the suggest command.
pub fn run(
    cwd: &Path,
    file: &Path,
    root: Option<&Path>,
    config: Config,
    context: Option<CompletionContext>,
    json: bool,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    let prompter = ImportPrompter::new(
        host_for(cwd, file, root),
        config,
        Arc::new(NoWatcher),
        runtime.handle().clone(),
    );

    let packages = match context {
        Some(ctx) => prompter.suggestions_for(&ctx.language, &ctx.line),
        None => prompter.get_scripts(),
    };

    print_packages(packages.as_deref(), json);
    Ok(())
}
