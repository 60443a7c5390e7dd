use clap::Parser;
use std::path::PathBuf;

/// docsweep: bulk purge of one collection
#[derive(Parser, Debug)]
#[command(
    name = "docsweep",
    version,
    about = "Bulk-delete every record of a collection with parallel delete workers",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Collection to purge
    pub collection: String,

    /// Number of delete workers (default 1)
    #[arg(short = 't', long)]
    pub threads_count: Option<usize>,

    /// Log level: off|error|warn|info|debug|trace (RUST_LOG takes precedence)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Store: fs:<dir> (document directory) or mem:<n> (dry run over n generated records)
    #[arg(long, default_value = "fs:.")]
    pub store: String,

    /// Config file (TOML). CLI flags override config values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// References per delete-many (default 250)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Empty-queue poll interval in ms (default 2000)
    #[arg(long)]
    pub empty_timeout_ms: Option<u64>,

    /// Max enumeration passes; 0 = retry forever (default 5)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Print the final report as one JSON object
    #[arg(long)]
    pub json: bool,
}
