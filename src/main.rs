// sheet-cache - Two-tier artifact cache for spreadsheet conversion
// Author: kelexine (https://github.com/kelexine)

use anyhow::Result;
use clap::Parser;
use sheet_cache::cache::CacheManager;
use sheet_cache::cli::{Args, Command};
use sheet_cache::config::AppConfig;
use sheet_cache::metrics;
use sheet_cache::utils::logging;
use tracing::info;

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(dir) = &args.cache_dir {
        config.cache.cache_dir = Some(dir.to_string_lossy().to_string());
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting sheet-cache v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Validate cache configuration and open the tiers
    let manager = CacheManager::new(config.cache_config()?)?;

    // Phase 4: Run the requested maintenance command
    match args.command {
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&manager.get_stats())?);
        }
        Command::Optimize => {
            let report = manager.optimize();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Clear => {
            manager.clear();
            info!("Cache cleared at {}", manager.config().cache_dir().display());
        }
        Command::Key { file, range, sheet } => {
            let key = manager.key_for(&file, range.as_deref(), sheet.as_deref());
            println!("{}", key);
        }
        Command::Metrics => {
            // Populate disk gauges before exporting.
            if let Some(disk) = &manager.get_stats().disk {
                metrics::update_disk_usage(disk.total_bytes);
            }
            print!("{}", metrics::gather_metrics());
        }
    }

    Ok(())
}
