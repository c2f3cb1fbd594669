//! Synchronous processing strategy
//!
//! This module provides a sequential implementation of the ProcessingStrategy
//! trait. It orchestrates a run by coordinating the catalog loader, the
//! SyncReader (request input) and the RedemptionEngine (business logic).
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - Catalog seeding to `io::catalog`
//! - Request parsing and grouping to `SyncReader` (iterator interface)
//! - Redemption to `RedemptionEngine`
//! - Output to `csv_format::write_balances_csv` and the ledger writer
//!
//! Requests are submitted one at a time in file order, so this strategy is
//! the reference the concurrent one is checked against.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::RedemptionEngine;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{seed_store, write_results, ProcessingStrategy, RunConfig, RunSummary};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use voucher_redemption_engine::strategy::{ProcessingStrategy, RunConfig, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(RunConfig::new("catalog"));
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("requests.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    run: RunConfig,
}

impl SyncProcessingStrategy {
    pub fn new(run: RunConfig) -> Self {
        Self { run }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Process requests from input file and write balances to output
    ///
    /// 1. Seeds an in-memory store from the catalog directory
    /// 2. Streams requests from the CSV file with a SyncReader
    /// 3. Redeems each request in file order
    /// 4. Writes the ledger (if configured) and the balances
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let store = seed_store(&self.run)?;
        let engine = RedemptionEngine::new(Arc::clone(&store));
        let reader = SyncReader::new(input_path)?;

        let mut summary = RunSummary::default();
        for result in reader {
            match result {
                Ok(labeled) => match engine.redeem(&labeled.request, self.run.as_of) {
                    Ok(_) => summary.committed += 1,
                    Err(e) => {
                        debug!(request = %labeled.label, error = %e, "request rejected");
                        summary.rejected += 1;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "skipping malformed request");
                    summary.malformed += 1;
                }
            }
        }
        summary.log();

        write_results(&store, &self.run, output)
    }
}
