use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};

use crate::strategy::{BatchConfig, RunConfig};

/// Redeem loyalty vouchers for points in bulk
#[derive(Parser, Debug)]
#[command(name = "voucher-redemption")]
#[command(
    about = "Redeem loyalty vouchers for points from a CSV of requests",
    long_about = None
)]
pub struct CliArgs {
    /// Requests CSV file path
    #[arg(value_name = "REQUESTS", help = "Path to the redemption requests CSV file")]
    pub requests_file: PathBuf,

    /// Directory holding brands.csv, vouchers.csv and customers.csv
    #[arg(
        long = "catalog-dir",
        value_name = "DIR",
        env = "VOUCHER_CATALOG_DIR",
        default_value = "."
    )]
    pub catalog_dir: PathBuf,

    /// Processing strategy to use
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        env = "VOUCHER_STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// Number of requests per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        env = "VOUCHER_BATCH_SIZE",
        help = "Number of requests per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        env = "VOUCHER_MAX_CONCURRENT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Instant validity windows are evaluated at (RFC 3339, default: now)
    #[arg(long = "as-of", value_name = "TIMESTAMP", env = "VOUCHER_AS_OF")]
    pub as_of: Option<DateTime<Utc>>,

    /// Write every committed transaction as JSON lines to this file
    #[arg(long = "ledger", value_name = "PATH", env = "VOUCHER_LEDGER")]
    pub ledger: Option<PathBuf>,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values fall back with
    /// a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create the RunConfig shared by every strategy
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            catalog_dir: self.catalog_dir.clone(),
            as_of: self.as_of.unwrap_or_else(Utc::now),
            ledger: self.ledger.clone(),
        }
    }
}
