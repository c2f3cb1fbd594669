//! Core business logic module
//!
//! This module contains the redemption components:
//! - `traits` - Storage abstraction the engine runs against
//! - `entity_store` - Thread-safe in-memory store with row locks and rollback
//! - `unit_of_work` - Staged writes of one atomic redemption
//! - `validator` - Voucher existence, activity and validity window checks
//! - `calculator` - Item and grand totals with overflow checks
//! - `balance_guard` - Balance sufficiency check
//! - `engine` - Redemption orchestration and commit
//! - `reader` - Nested read-back of committed transactions
//! - `batch_processor` - Concurrent per-customer batch submission

pub mod balance_guard;
pub mod batch_processor;
pub mod calculator;
pub mod engine;
pub mod entity_store;
pub mod reader;
pub mod traits;
pub mod unit_of_work;
pub mod validator;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::RedemptionEngine;
pub use entity_store::{InMemoryEntityStore, WriteStep};
pub use reader::TransactionReader;
pub use traits::EntityStore;
pub use unit_of_work::{PendingWrites, UnitOfWork};
