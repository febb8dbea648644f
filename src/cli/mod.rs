// CLI module for sheet-cache
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sheet-cache - maintenance tool for the spreadsheet conversion cache
#[derive(Parser, Debug)]
#[command(name = "sheet-cache", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (defaults to the platform config directory)
    #[arg(long, short, env = "SHEET_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, env = "SHEET_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print cache statistics as JSON
    Stats,
    /// Remove expired and corrupted entries
    Optimize,
    /// Delete every cached entry
    Clear,
    /// Print the cache key for a file view
    Key {
        /// Spreadsheet file
        file: PathBuf,
        /// Cell range, e.g. A1:D10
        #[arg(long)]
        range: Option<String>,
        /// Sheet name
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Print Prometheus metrics gathered by this process
    Metrics,
}
