use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the rs-timeline tool.
#[derive(Parser, Debug)]
#[clap(name = "rs-timeline", about = "Parallel forensic timeline extraction", version)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract events from sources into a new store file
    Extract(ExtractOpts),

    /// Print a JSON summary of a closed store file
    Info {
        /// Path to the store file
        path: PathBuf,
    },

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "config.yaml")]
        path: PathBuf,
    },
}

/// Options for the extract subcommand.
///
/// Every option left unset falls back to the configuration file, then to
/// the built-in defaults.
#[derive(ClapArgs, Debug)]
pub struct ExtractOpts {
    /// Store file to create; must not exist yet
    #[clap(short, long)]
    pub storage: PathBuf,

    /// Parser filter expression (comma-separated names or presets, `!` excludes)
    #[clap(short, long)]
    pub parsers: Option<String>,

    /// Number of extraction worker threads
    #[clap(short, long)]
    pub workers: Option<usize>,

    /// Maximum number of tasks queued or running at once
    #[clap(long)]
    pub max_tasks: Option<usize>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Human readable label stored with the session
    #[clap(short, long)]
    pub label: Option<String>,

    /// Files or directories to extract from
    #[clap(required = true)]
    pub sources: Vec<PathBuf>,
}
