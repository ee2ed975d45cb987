use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hoard_types::Hour;

#[derive(Parser)]
#[command(
    name = "hoard",
    about = "Hoard: collect, archive and replicate data feeds",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "hoard.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only work on these feeds (repeatable)
    #[arg(long = "feed", global = true, value_name = "ID")]
    pub feeds: Vec<String>,

    /// Run feeds one after another instead of concurrently
    #[arg(long, global = true)]
    pub no_concurrency: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the collector until interrupted
    Collector,
    /// Download each feed once
    Download,
    /// Pack local downloads into archives
    Pack,
    /// Merge local archives hour by hour
    Merge,
    /// Upload local archives to object storage
    Upload,
    /// Pack and upload all local data
    Vacate(VacateArgs),
    /// Audit the data stored remotely
    Audit(AuditArgs),
    /// Retrieve data from object storage
    Retrieve(RetrieveArgs),
    /// Print the parsed configuration
    Config,
}

#[derive(Args)]
pub struct VacateArgs {
    /// Remove the workspace once everything is uploaded (with --feed, only
    /// those feeds' directories)
    #[arg(long)]
    pub remove_workspace: bool,
}

#[derive(Args)]
pub struct AuditArgs {
    /// First hour to audit, e.g. 2024-05-06T07 (default: unbounded)
    #[arg(long)]
    pub start: Option<Hour>,
    /// Last hour to audit (default: now)
    #[arg(long)]
    pub end: Option<Hour>,
    /// Fix the problems found
    #[arg(long)]
    pub fix: bool,
    /// Report archives whose compression differs from the configuration
    #[arg(long)]
    pub enforce_compression: bool,
}

#[derive(Args)]
pub struct RetrieveArgs {
    /// Directory to write into
    #[arg(long)]
    pub path: PathBuf,
    /// First hour to retrieve (default: unbounded)
    #[arg(long)]
    pub start: Option<Hour>,
    /// Last hour to retrieve (default: now)
    #[arg(long)]
    pub end: Option<Hour>,
    /// Keep archives packed
    #[arg(long)]
    pub keep_packed: bool,
    /// Put every feed's files in the same directory
    #[arg(long)]
    pub flatten_feeds: bool,
    /// Do not create per-hour subdirectories
    #[arg(long)]
    pub flatten_hours: bool,
}
