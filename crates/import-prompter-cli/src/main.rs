#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;

use clap::Parser;
use commands::suggest::CompletionContext;
use import_prompter_core::Config;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "import-prompter")]
#[command(author, version, about = "Suggest importable package names for a source file", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Load settings from a JSON config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Leave peerDependencies out of the candidate list
    #[arg(long, global = true)]
    no_peer: bool,

    /// Glob patterns of package names to hide (repeatable or comma-separated)
    #[arg(long, global = true, value_name = "GLOB", value_delimiter = ',')]
    exclude: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Print import candidates for a file
    Suggest {
        /// Active source file
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// Editor workspace root (defaults to the working directory)
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        /// Editor language id; only suggest when it is supported
        #[arg(long, requires = "line")]
        language: Option<String>,

        /// Text typed so far on the line; only suggest while it is a prefix of the trigger word
        #[arg(long, requires = "language")]
        line: Option<String>,
    },

    /// Keep caches live and reprint candidates when manifests change
    Watch {
        /// Active source file
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// Editor workspace root (defaults to the working directory)
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    // Build config: file first, flags override
    let mut config = match &cli.config {
        Some(path) => Config::load(&cwd.join(path)).into_diagnostic()?,
        None => Config::default(),
    };
    if cli.no_peer {
        config = config.with_peer_dependencies(false);
    }
    if !cli.exclude.is_empty() {
        config = config.with_exclude_packages(cli.exclude);
    }

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Suggest {
            file,
            root,
            language,
            line,
        }) => {
            let span = tracing::info_span!("suggest", cmd = "suggest", cwd = %cwd.display());
            let _guard = span.enter();
            let context = language
                .zip(line)
                .map(|(language, line)| CompletionContext { language, line });
            commands::suggest::run(&cwd, &file, root.as_deref(), config, context, cli.json)
        }
        Some(Commands::Watch { file, root }) => {
            commands::watch::run(&cwd, &file, root.as_deref(), config, cli.json)
        }
    }
}
