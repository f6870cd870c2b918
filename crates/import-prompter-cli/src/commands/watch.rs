//! `import-prompter watch` command implementation.
//!
//! Keeps the caches live with a notify watcher and reprints the candidate
//! list whenever it changes, until interrupted.

use super::{host_for, print_packages};
use import_prompter_core::{Config, ImportPrompter, NotifyWatcher, StaticHost};
use miette::{IntoDiagnostic, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

/// How often the candidate list is re-read from the cache.
const REFRESH_INTERVAL_MS: u64 = 250;

/// Run the watch command.
pub fn run(cwd: &Path, file: &Path, root: Option<&Path>, config: Config, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let host = host_for(cwd, file, root);
    runtime.block_on(watch_loop(host, config, runtime.handle().clone(), json))
}

async fn watch_loop(host: StaticHost, config: Config, handle: Handle, json: bool) -> Result<()> {
    let watcher = NotifyWatcher::new(&handle).into_diagnostic()?;
    let prompter = ImportPrompter::new(host, config, Arc::new(watcher), handle);

    let mut last = prompter.get_scripts();
    print_packages(last.as_deref(), json);
    info!("Watching for manifest changes (Ctrl-C to stop)");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interval = tokio::time::interval(Duration::from_millis(REFRESH_INTERVAL_MS));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = interval.tick() => {
                let next = prompter.get_scripts();
                if next != last {
                    print_packages(next.as_deref(), json);
                    last = next;
                }
            }
        }
    }

    prompter.clear_all_caches();
    Ok(())
}
