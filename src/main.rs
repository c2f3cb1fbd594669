//! Voucher Redemption CLI
//!
//! Command-line interface for redeeming vouchers in bulk from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --catalog-dir catalog requests.csv > balances.csv
//! cargo run -- --strategy sync --as-of 2025-03-15T12:00:00Z requests.csv > balances.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 requests.csv > balances.csv
//! cargo run -- --ledger ledger.jsonl requests.csv > balances.csv
//! ```
//!
//! The program seeds an in-memory store from the catalog directory, redeems
//! every request in the requests file with the selected strategy, and writes
//! the final customer balances to stdout. Logs go to stderr.
//!
//! # Processing Strategies
//!
//! - **sync**: Requests redeemed one at a time in file order
//! - **async**: Batches partitioned by customer and redeemed concurrently (default)
//!
//! # Exit Codes
//!
//! - 0: Success (individual rejected requests do not count as failures)
//! - 1: Error (missing file, unreadable catalog, invalid catalog row, etc.)

use std::process;

use tracing::error;
use voucher_redemption_engine::cli;
use voucher_redemption_engine::strategy;

fn main() {
    let args = cli::parse_args();
    cli::init_logging();

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), args.to_run_config(), config)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.requests_file, &mut output) {
        error!("{}", e);
        process::exit(1);
    }
}
