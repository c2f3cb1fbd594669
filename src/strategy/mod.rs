//! Processing strategy module for redemption batches
//!
//! This module defines the Strategy pattern for complete redemption pipelines:
//! seeding the store from the catalog, streaming requests through the engine
//! and writing final balances. Different implementations (sequential,
//! concurrent batch) can be selected at runtime and must produce the same
//! balances for the same input.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::cli::StrategyType;
use crate::core::{InMemoryEntityStore, TransactionReader};
use crate::io::{load_catalog, write_balances_csv, write_ledger_jsonl};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Settings shared by every strategy
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding the catalog CSV files
    pub catalog_dir: PathBuf,

    /// Instant voucher validity windows are evaluated at
    pub as_of: DateTime<Utc>,

    /// Where to write the JSON-lines ledger, if anywhere
    pub ledger: Option<PathBuf>,
}

impl RunConfig {
    /// Run against `catalog_dir` at the current instant, without a ledger
    pub fn new(catalog_dir: impl Into<PathBuf>) -> Self {
        RunConfig {
            catalog_dir: catalog_dir.into(),
            as_of: Utc::now(),
            ledger: None,
        }
    }
}

/// Processing strategy trait for complete redemption pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Process redemption requests from input file and write balances to output
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the requests CSV file
    /// * `output` - Writer receiving the `customer,points` CSV
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The catalog or the requests file cannot be opened
    /// - A catalog row is invalid
    /// - Output or the ledger cannot be written
    ///
    /// Rejected or malformed requests are logged and counted; they never make
    /// this method fail.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Outcome counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Requests that created a transaction or replayed an idempotency key
    pub committed: usize,

    /// Well-formed requests the engine refused
    pub rejected: usize,

    /// Requests dropped before reaching the engine; the batch reader skips
    /// these itself, so only the sequential strategy counts them
    pub malformed: usize,
}

impl RunSummary {
    fn log(&self) {
        info!(
            committed = self.committed,
            rejected = self.rejected,
            malformed = self.malformed,
            "requests processed"
        );
    }
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sequential or concurrent processing
/// * `run` - Catalog location, evaluation instant and ledger path
/// * `config` - Batch configuration for the concurrent strategy (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    run: RunConfig,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(run)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(run, config))
        }
    }
}

/// Build a store seeded from the run's catalog directory
fn seed_store(run: &RunConfig) -> Result<Arc<InMemoryEntityStore>, String> {
    let store = InMemoryEntityStore::new();
    load_catalog(&run.catalog_dir, &store)?;
    Ok(Arc::new(store))
}

/// Write final balances, and the ledger if one was requested
fn write_results(
    store: &Arc<InMemoryEntityStore>,
    run: &RunConfig,
    output: &mut dyn Write,
) -> Result<(), String> {
    let customers = store.customers();

    if let Some(path) = &run.ledger {
        let reader = TransactionReader::new(Arc::clone(store));
        let mut views = Vec::new();
        for customer in &customers {
            let history = reader
                .list_by_customer(customer.id)
                .map_err(|e| format!("Failed to read transactions: {}", e))?;
            views.extend(history);
        }

        let file = File::create(path)
            .map_err(|e| format!("Failed to create ledger '{}': {}", path.display(), e))?;
        let mut ledger = BufWriter::new(file);
        write_ledger_jsonl(&views, &mut ledger)?;
        info!(path = %path.display(), transactions = views.len(), "ledger written");
    }

    write_balances_csv(&customers, output)
}
