// sheet-cache - Two-tier artifact cache for spreadsheet conversion
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod utils;

pub use cache::{CacheConfig, CacheManager};
pub use error::{CacheError, Result};
