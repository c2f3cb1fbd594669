//! Batch processing with customer-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which runs batches of
//! redemption requests concurrently while keeping each customer's requests in
//! submission order.
//!
//! # Design
//!
//! A batch is split into one sub-batch per customer. Each sub-batch runs on
//! its own tokio task and submits its requests one after another, so the
//! balance a request sees reflects every earlier request of the same
//! customer. Requests of different customers never touch the same balance and
//! run in parallel.
//!
//! # Thread Safety
//!
//! The processor is cloneable and shares one engine (and so one store)
//! between all of its tasks. Correctness under concurrency comes from the
//! store's row locks, not from the partitioning.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::error;

use crate::core::engine::RedemptionEngine;
use crate::core::traits::EntityStore;
use crate::io::LabeledRequest;
use crate::types::{CustomerId, RedemptionError, TransactionId};

/// Result of processing a single request
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The request that was processed
    pub request: LabeledRequest,

    /// Committed transaction id, or why the request was rejected
    pub result: Result<TransactionId, RedemptionError>,
}

/// Batch processor with customer-based partitioning
#[derive(Debug)]
pub struct BatchProcessor<S> {
    engine: RedemptionEngine<S>,
}

impl<S> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        BatchProcessor {
            engine: self.engine.clone(),
        }
    }
}

impl<S: EntityStore + 'static> BatchProcessor<S> {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine every task submits through
    pub fn new(engine: RedemptionEngine<S>) -> Self {
        Self { engine }
    }

    /// Partition a batch of requests by customer id
    ///
    /// # Guarantees
    ///
    /// - Each request appears in exactly one sub-batch
    /// - Requests for each customer keep their original order
    pub fn partition_by_customer(
        &self,
        batch: Vec<LabeledRequest>,
    ) -> HashMap<CustomerId, Vec<LabeledRequest>> {
        let mut customer_batches: HashMap<CustomerId, Vec<LabeledRequest>> = HashMap::new();

        for request in batch {
            customer_batches
                .entry(request.request.customer)
                .or_default()
                .push(request);
        }

        customer_batches
    }

    /// Process all requests of one customer sequentially
    ///
    /// Rejections are captured in the results and do not stop the remaining
    /// requests. Results are in input order.
    pub async fn process_customer_requests(
        &self,
        requests: Vec<LabeledRequest>,
        now: DateTime<Utc>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            let result = self.engine.redeem(&request.request, now);
            results.push(ProcessingResult { request, result });
        }

        results
    }

    /// Process a batch of requests with customer-based partitioning
    ///
    /// 1. Partition the batch by customer id
    /// 2. Spawn a tokio task per customer
    /// 3. Wait for every task and collect the results
    ///
    /// Results are sorted by request sequence number, so the outcome order
    /// matches the input order regardless of task scheduling.
    pub async fn process_batch(
        &self,
        batch: Vec<LabeledRequest>,
        now: DateTime<Utc>,
    ) -> Vec<ProcessingResult> {
        let customer_batches = self.partition_by_customer(batch);

        let mut tasks = Vec::with_capacity(customer_batches.len());
        for (_customer, requests) in customer_batches {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_customer_requests(requests, now).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(customer_results) => results.extend(customer_results),
                Err(e) => error!(error = %e, "customer task failed"),
            }
        }

        results.sort_by_key(|processed| processed.request.sequence);
        results
    }
}
