//! Asynchronous batch processing strategy
//!
//! This module provides a concurrent implementation of the ProcessingStrategy
//! trait. It processes requests in batches with customer-based partitioning.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── RunConfig (catalog dir, as-of instant, ledger path)
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batched request reading)
//!     ├── BatchProcessor (customer partitioning + tasks)
//!     └── RedemptionEngine
//!         └── InMemoryEntityStore (row locks, commit gate)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed one after another, so a customer's requests keep
//!   file order even when they span batches
//! - Within a batch, each customer's requests run on their own task

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{BatchProcessor, RedemptionEngine};
use crate::io::async_reader::AsyncReader;
use crate::strategy::{seed_store, write_results, ProcessingStrategy, RunConfig, RunSummary};

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of requests per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values with defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid worker count, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
///
/// Requests are read in batches and batches run one after another. Within a
/// batch, requests are partitioned by customer and the partitions run in
/// parallel on a multi-threaded tokio runtime.
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    run: RunConfig,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(run: RunConfig, config: BatchConfig) -> Self {
        Self { run, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Process requests from input file and write balances to output
    ///
    /// 1. Seeds an in-memory store from the catalog directory
    /// 2. Creates a tokio multi-threaded runtime
    /// 3. Reads requests in batches with an AsyncReader
    /// 4. Processes each batch with a BatchProcessor, waiting before the next
    /// 5. Writes the ledger (if configured) and the balances
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let store = seed_store(&self.run)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let summary = runtime.block_on(async {
            let processor = BatchProcessor::new(RedemptionEngine::new(Arc::clone(&store)));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut summary = RunSummary::default();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for processed in processor.process_batch(batch, self.run.as_of).await {
                    match processed.result {
                        Ok(_) => summary.committed += 1,
                        Err(e) => {
                            debug!(request = %processed.request.label, error = %e, "request rejected");
                            summary.rejected += 1;
                        }
                    }
                }
            }

            Ok::<_, String>(summary)
        })?;
        summary.log();

        write_results(&store, &self.run, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ANN: &str = "00000000-0000-0000-0000-00000000000a";
    const BOB: &str = "00000000-0000-0000-0000-00000000000b";
    const COFFEE: &str = "00000000-0000-0000-0000-000000000c01";

    fn workspace(requests: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("brands.csv"),
            "id,name,description,logo_url,is_active\n\
             00000000-0000-0000-0000-0000000000b1,Acme,,,true\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("vouchers.csv"),
            format!(
                "id,brand_id,name,description,cost_in_point,valid_from,valid_to,is_active\n\
                 {COFFEE},00000000-0000-0000-0000-0000000000b1,Coffee,,100,,,true\n"
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("customers.csv"),
            format!(
                "id,name,email,phone,points,is_active\n\
                 {ANN},Ann,ann@example.com,,250,true\n\
                 {BOB},Bob,bob@example.com,,500,true\n"
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("requests.csv"),
            format!("request,customer,voucher,quantity,idempotency_key\n{requests}"),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let dir = workspace("");
        let strategy = AsyncProcessingStrategy::new(RunConfig::new(dir.path()), BatchConfig::default());
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        // Ann can afford two coffees; her third request must be the rejected one
        let dir = workspace(&format!(
            "r1,{ANN},{COFFEE},1,\n\
             r2,{BOB},{COFFEE},1,\n\
             r3,{ANN},{COFFEE},1,\n\
             r4,{BOB},{COFFEE},2,\n\
             r5,{ANN},{COFFEE},1,\n"
        ));

        let config = BatchConfig::new(2, num_cpus::get());
        let strategy = AsyncProcessingStrategy::new(RunConfig::new(dir.path()), config);
        let mut output = Vec::new();
        strategy
            .process(&dir.path().join("requests.csv"), &mut output)
            .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("customer,points\n{ANN},50\n{BOB},200\n")
        );
    }

    #[test]
    fn test_async_strategy_truncated_row_rejects_whole_request() {
        let dir = workspace(&format!(
            "r1,{BOB},{COFFEE},1,\n\
             r1,{BOB},{COFFEE},2,\n\
             r1,{BOB}\n\
             r2,{ANN},{COFFEE},1,\n"
        ));

        let config = BatchConfig::new(1, 2);
        let strategy = AsyncProcessingStrategy::new(RunConfig::new(dir.path()), config);
        let mut output = Vec::new();
        strategy
            .process(&dir.path().join("requests.csv"), &mut output)
            .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("customer,points\n{ANN},150\n{BOB},500\n")
        );
    }

    #[test]
    fn test_batch_config_zero_values_fall_back() {
        let config = BatchConfig::new(0, 0);

        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }
}
